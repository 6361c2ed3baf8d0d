use crate::HeaderValue;
use smallvec::{smallvec, SmallVec};
use std::fmt::{self, Debug, Formatter};

/// A list of values for a given header name. Most headers have
/// exactly one value, so this is a [`SmallVec`] sized for one.
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderValues(SmallVec<[HeaderValue; 1]>);

impl HeaderValues {
    /// construct an empty header values list
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// The singular representative value. When several values have
    /// been appended under the same name, the most recently appended
    /// one wins, matching last-value-wins extraction of typed
    /// headers.
    pub fn one(&self) -> Option<&HeaderValue> {
        self.0.last()
    }

    /// the representative value as a &str, if it is utf8
    pub fn as_str(&self) -> Option<&str> {
        self.one().and_then(HeaderValue::as_str)
    }

    /// how many values are stored under this name
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// append a value
    pub fn append(&mut self, value: HeaderValue) {
        self.0.push(value);
    }

    /// iterate over the values
    pub fn iter(&self) -> std::slice::Iter<'_, HeaderValue> {
        self.0.iter()
    }
}

impl Default for HeaderValues {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for HeaderValues {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            Debug::fmt(&self.0[0], f)
        } else {
            f.debug_list().entries(&self.0).finish()
        }
    }
}

impl Extend<HeaderValue> for HeaderValues {
    fn extend<T: IntoIterator<Item = HeaderValue>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for HeaderValues {
    type Item = HeaderValue;
    type IntoIter = smallvec::IntoIter<[HeaderValue; 1]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a HeaderValues {
    type Item = &'a HeaderValue;
    type IntoIter = std::slice::Iter<'a, HeaderValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<V> From<V> for HeaderValues
where
    V: Into<HeaderValue>,
{
    fn from(value: V) -> Self {
        Self(smallvec![value.into()])
    }
}

impl From<Vec<HeaderValue>> for HeaderValues {
    fn from(values: Vec<HeaderValue>) -> Self {
        Self(values.into())
    }
}
