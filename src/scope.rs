use std::ops::{Deref, DerefMut};

use crate::reflect::Ty;

/// Instruction operand telling a compiled path where its starting model lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Load {
    /// The model the routine (or the enclosing include) was invoked with.
    Argument,
    /// The model of the context `up` levels out from the innermost one.
    Frame { up: usize },
}

/// Knows how to re-obtain the model of one context depth.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Loader {
    depth: usize,
    ty: Ty,
}

impl Loader {
    pub(crate) const fn ty(&self) -> &Ty {
        &self.ty
    }

    /// Emits the load for this depth, as seen from code emitted at `top`.
    pub(crate) fn emit(&self, top: usize) -> Option<Load> {
        if self.depth == 0 {
            return Some(Load::Argument);
        }
        top.checked_sub(self.depth).map(|up| Load::Frame { up })
    }
}

/// Compile-time stack of model contexts, bottom first.
///
/// The bottom entry is the model argument of the routine being emitted; each
/// nested context (an iteration body) pushes one more. Entries are pushed
/// through [`ScopeStack::enter`] so they are popped again however emission of
/// the nested region ends.
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    loaders: Vec<Loader>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, ty: Ty) {
        let depth = self.loaders.len();
        self.loaders.push(Loader { depth, ty });
    }

    pub(crate) fn pop(&mut self) -> Option<Loader> {
        self.loaders.pop()
    }

    pub(crate) fn depth(&self) -> usize {
        self.loaders.len()
    }

    fn top(&self) -> usize {
        self.loaders.len().saturating_sub(1)
    }

    /// The innermost model context.
    pub(crate) fn current_model(&self) -> Option<(Load, &Ty)> {
        let loader = self.loaders.last()?;
        Some((loader.emit(self.top())?, loader.ty()))
    }

    /// The outermost model context, whatever the nesting depth.
    pub(crate) fn root_model(&self) -> Option<(Load, &Ty)> {
        let loader = self.loaders.first()?;
        Some((loader.emit(self.top())?, loader.ty()))
    }

    /// Opens a nested context for the lifetime of the returned guard.
    pub(crate) fn enter(&mut self, ty: Ty) -> ScopeGuard<'_> {
        self.push(ty);
        ScopeGuard { stack: self }
    }

    /// Swaps in a fresh stack holding only `ty` as its argument, restoring
    /// the current one when the guard drops.
    pub(crate) fn isolate(&mut self, ty: Ty) -> IsolatedScope<'_> {
        let saved = std::mem::take(&mut self.loaders);
        self.push(ty);
        IsolatedScope { stack: self, saved }
    }
}

pub(crate) struct ScopeGuard<'a> {
    stack: &'a mut ScopeStack,
}

impl Deref for ScopeGuard<'_> {
    type Target = ScopeStack;

    fn deref(&self) -> &Self::Target {
        self.stack
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stack
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}

pub(crate) struct IsolatedScope<'a> {
    stack: &'a mut ScopeStack,
    saved: Vec<Loader>,
}

impl Deref for IsolatedScope<'_> {
    type Target = ScopeStack;

    fn deref(&self) -> &Self::Target {
        self.stack
    }
}

impl DerefMut for IsolatedScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stack
    }
}

impl Drop for IsolatedScope<'_> {
    fn drop(&mut self) {
        self.stack.loaders = std::mem::take(&mut self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails_inside(stack: &mut ScopeStack) -> Result<(), &'static str> {
        let mut nested = stack.enter(Ty::I32);
        let _deeper = nested.enter(Ty::Str);
        Err("emission failed")
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_stack_has_no_models() {
        let stack = ScopeStack::new();
        assert_eq!(stack.depth(), 0);
        assert!(stack.current_model().is_none());
        assert!(stack.root_model().is_none());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_single_context_is_the_argument() {
        let mut stack = ScopeStack::new();
        stack.push(Ty::Str);
        assert_eq!(stack.current_model(), Some((Load::Argument, &Ty::Str)));
        assert_eq!(stack.root_model(), Some((Load::Argument, &Ty::Str)));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_nested_contexts() {
        let mut stack = ScopeStack::new();
        stack.push(Ty::Str);
        {
            let mut first = stack.enter(Ty::I32);
            assert_eq!(first.current_model(), Some((Load::Frame { up: 0 }, &Ty::I32)));
            assert_eq!(first.root_model(), Some((Load::Argument, &Ty::Str)));

            let second = first.enter(Ty::Bool);
            assert_eq!(second.depth(), 3);
            assert_eq!(second.current_model(), Some((Load::Frame { up: 0 }, &Ty::Bool)));
            assert_eq!(second.root_model(), Some((Load::Argument, &Ty::Str)));
        }
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current_model(), Some((Load::Argument, &Ty::Str)));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_loader_emits_relative_to_top() {
        let mut stack = ScopeStack::new();
        stack.push(Ty::Str);
        stack.push(Ty::I32);
        stack.push(Ty::Bool);
        let middle = stack.loaders.get(1).unwrap().clone();
        assert_eq!(middle.emit(2), Some(Load::Frame { up: 1 }));
        assert_eq!(middle.emit(1), Some(Load::Frame { up: 0 }));
        assert_eq!(middle.emit(0), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_failed_region_still_pops() {
        let mut stack = ScopeStack::new();
        stack.push(Ty::Str);
        assert!(fails_inside(&mut stack).is_err());
        assert_eq!(stack.depth(), 1);

        // A sibling region starts from the same depth.
        let sibling = stack.enter(Ty::U8);
        assert_eq!(sibling.depth(), 2);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_isolate_restores_outer_stack() {
        let mut stack = ScopeStack::new();
        stack.push(Ty::Str);
        let mut outer = stack.enter(Ty::I32);
        {
            let isolated = outer.isolate(Ty::Bool);
            assert_eq!(isolated.depth(), 1);
            assert_eq!(isolated.root_model(), Some((Load::Argument, &Ty::Bool)));
        }
        assert_eq!(outer.depth(), 2);
        assert_eq!(outer.current_model(), Some((Load::Frame { up: 0 }, &Ty::I32)));
    }
}
