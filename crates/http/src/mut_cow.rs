use std::ops::{Deref, DerefMut};

/// Like a [`std::borrow::Cow`], but mutable through both variants. A
/// [`crate::ReceivedBody`] uses this to either borrow its transport
/// from a conn or own it outright.
#[derive(Debug)]
pub enum MutCow<'a, T> {
    /// an owned T
    Owned(T),

    /// a mutably borrowed T
    Borrowed(&'a mut T),
}

impl<T> MutCow<'_, T> {
    /// whether this is the owned variant
    pub fn is_owned(&self) -> bool {
        matches!(self, MutCow::Owned(_))
    }

    /// take the owned value, panicking on the borrowed variant.
    /// callers must check [`MutCow::is_owned`] first.
    pub fn unwrap_owned(self) -> T {
        match self {
            MutCow::Owned(t) => t,
            MutCow::Borrowed(_) => panic!("attempted to unwrap a borrowed mut_cow"),
        }
    }
}

impl<T> From<T> for MutCow<'_, T> {
    fn from(t: T) -> Self {
        MutCow::Owned(t)
    }
}

impl<'a, T> From<&'a mut T> for MutCow<'a, T> {
    fn from(t: &'a mut T) -> Self {
        MutCow::Borrowed(t)
    }
}

impl<T> Deref for MutCow<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self {
            MutCow::Owned(t) => t,
            MutCow::Borrowed(t) => t,
        }
    }
}

impl<T> DerefMut for MutCow<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            MutCow::Owned(t) => t,
            MutCow::Borrowed(t) => t,
        }
    }
}
