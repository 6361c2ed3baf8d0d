use crate::{
    header_name::is_tchar, Error, HeaderName, HeaderValue, HeaderValues, Result,
};
use memchr::memmem::Finder;
use std::fmt::{self, Debug, Display, Formatter};

/// Freshet's header map type.
///
/// An ordered mapping of case-insensitive header names to values.
/// Names are stored lowercased, once per name, and render in
/// `Kebab-Case` when the map is serialized. Insertion order is
/// preserved.
#[derive(Clone, PartialEq, Eq, Default)]
#[must_use]
pub struct Headers {
    entries: Vec<(HeaderName, HeaderValues)>,
}

impl Headers {
    /// Construct an empty header map
    pub fn new() -> Self {
        Self::default()
    }

    /// How many unique header names have been added?  Note that each
    /// name may hold more than one [`HeaderValue`].
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Are there zero headers?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &HeaderName) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    /// Add a header value or values. If a header already exists with
    /// the same name it is replaced. To combine, see
    /// [`Headers::append`].
    pub fn insert(&mut self, name: impl Into<HeaderName>, values: impl Into<HeaderValues>) {
        let name = name.into();
        let values = values.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1 = values,
            None => self.entries.push((name, values)),
        }
    }

    /// Add a header value or values, retaining any values already
    /// stored under the same name. To replace, see
    /// [`Headers::insert`].
    pub fn append(&mut self, name: impl Into<HeaderName>, values: impl Into<HeaderValues>) {
        let name = name.into();
        let values = values.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1.extend(values),
            None => self.entries.push((name, values)),
        }
    }

    /// Add a header value or values if and only if there is not
    /// already a header with the same name
    pub fn try_insert(&mut self, name: impl Into<HeaderName>, values: impl Into<HeaderValues>) {
        let name = name.into();
        if self.position(&name).is_none() {
            self.entries.push((name, values.into()));
        }
    }

    /// If the name is not already present, execute the provided
    /// function and insert its result
    pub fn try_insert_with<V>(&mut self, name: impl Into<HeaderName>, values: impl FnOnce() -> V)
    where
        V: Into<HeaderValues>,
    {
        let name = name.into();
        if self.position(&name).is_none() {
            self.entries.push((name, values().into()));
        }
    }

    /// Retrieve all values for the provided name, if any
    pub fn get_values(&self, name: impl Into<HeaderName>) -> Option<&HeaderValues> {
        let name = name.into();
        self.position(&name).map(|index| &self.entries[index].1)
    }

    /// Retrieve the representative value for the name, following the
    /// last-value-wins behavior described at [`HeaderValues::one`]
    pub fn get(&self, name: impl Into<HeaderName>) -> Option<&HeaderValue> {
        self.get_values(name).and_then(HeaderValues::one)
    }

    /// Retrieve a &str value if there is at least one utf8 value for
    /// this name
    pub fn get_str(&self, name: impl Into<HeaderName>) -> Option<&str> {
        self.get_values(name).and_then(HeaderValues::as_str)
    }

    /// Remove and return all values stored under this name
    pub fn remove(&mut self, name: impl Into<HeaderName>) -> Option<HeaderValues> {
        let name = name.into();
        self.position(&name)
            .map(|index| self.entries.remove(index).1)
    }

    /// Predicate to check whether the map contains the provided name
    pub fn has_header(&self, name: impl Into<HeaderName>) -> bool {
        let name = name.into();
        self.position(&name).is_some()
    }

    /// Convenience predicate: is the value for this name
    /// ascii-case-insensitively equal to the provided needle? False
    /// when the name is absent.
    pub fn eq_ignore_ascii_case(&self, name: impl Into<HeaderName>, needle: &str) -> bool {
        self.get_str(name)
            .is_some_and(|v| v.eq_ignore_ascii_case(needle))
    }

    /// The parsed `Content-Length`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is present but not a
    /// non-negative integer.
    pub fn content_length(&self) -> Result<Option<u64>> {
        match self.get_str("content-length") {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| Error::InvalidHeaderValue(HeaderName::new("content-length"))),
        }
    }

    /// Whether `Transfer-Encoding: chunked` is declared
    pub fn is_chunked(&self) -> bool {
        self.eq_ignore_ascii_case("transfer-encoding", "chunked")
    }

    /// Chainable method to insert a header
    pub fn with_inserted_header(
        mut self,
        name: impl Into<HeaderName>,
        values: impl Into<HeaderValues>,
    ) -> Self {
        self.insert(name, values);
        self
    }

    /// Chainable method to remove a header
    pub fn without_header(mut self, name: impl Into<HeaderName>) -> Self {
        self.remove(name);
        self
    }

    /// Iterate over borrowed names and values in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValues)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }

    /// Parse a block of header lines, appending to this map. Returns
    /// the number of headers added.
    ///
    /// Lines are CRLF-separated; a line with no colon is ignored; the
    /// value is trimmed of optional whitespace.
    ///
    /// # Errors
    ///
    /// Errors when a header name contains non-token characters.
    pub fn extend_parse(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut added = 0;
        let finder = Finder::new(b"\r\n");
        let mut line_start = 0;
        loop {
            let line = match finder.find(&bytes[line_start..]) {
                Some(index) => &bytes[line_start..line_start + index],
                None => &bytes[line_start..],
            };

            if line.is_empty() {
                break;
            }

            if let Some((name, value)) = parse_header_line(line)? {
                self.append(name, value);
                added += 1;
            }

            line_start += line.len() + 2;
            if line_start >= bytes.len() {
                break;
            }
        }
        Ok(added)
    }

    /// Parse a block of CRLF-separated header lines into a new map
    ///
    /// # Errors
    ///
    /// Errors when a header name contains non-token characters.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut headers = Headers::new();
        headers.extend_parse(bytes)?;
        Ok(headers)
    }
}

/// Split a single header line at the first colon. Returns `None` for
/// lines without a colon, which are ignored by the parsers.
pub(crate) fn parse_header_line(line: &[u8]) -> Result<Option<(HeaderName, HeaderValue)>> {
    let Some(colon) = memchr::memchr(b':', line) else {
        return Ok(None);
    };

    let mut token_end = 0;
    while token_end < colon && is_tchar(line[token_end]) {
        token_end += 1;
    }

    if token_end != colon || colon == 0 {
        return Err(Error::InvalidHeaderName);
    }

    let name = HeaderName::parse(&line[..colon])?;
    let mut value = &line[colon + 1..];
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }

    Ok(Some((name, HeaderValue::parse(value))))
}

impl Display for Headers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (name, values) in self.iter() {
            for value in values {
                f.write_fmt(format_args!("{name}: {value}\r\n"))?;
            }
        }
        Ok(())
    }
}

impl Debug for Headers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, values) in self.iter() {
            map.entry(&name.as_str(), values);
        }
        map.finish()
    }
}

impl<HN, HV> Extend<(HN, HV)> for Headers
where
    HN: Into<HeaderName>,
    HV: Into<HeaderValues>,
{
    fn extend<T: IntoIterator<Item = (HN, HV)>>(&mut self, iter: T) {
        for (name, values) in iter {
            self.append(name, values);
        }
    }
}

impl<HN, HV> FromIterator<(HN, HV)> for Headers
where
    HN: Into<HeaderName>,
    HV: Into<HeaderValues>,
{
    fn from_iter<T: IntoIterator<Item = (HN, HV)>>(iter: T) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}

#[cfg(test)]
mod test {
    use super::Headers;

    #[test]
    fn case_insensitive_lookup_preserving_insertion_order() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        headers.insert("HOST", "example.com");
        assert_eq!(headers.get_str("content-type"), Some("text/plain"));
        assert_eq!(headers.get_str("host"), Some("example.com"));

        let names = headers
            .iter()
            .map(|(n, _)| n.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Content-Type", "Host"]);
    }

    #[test]
    fn insert_replaces_append_accumulates() {
        let mut headers = Headers::new();
        headers.append("set-cookie", "a=1");
        headers.append("set-cookie", "b=2");
        assert_eq!(headers.get_values("set-cookie").unwrap().len(), 2);
        // last value wins for representative reads
        assert_eq!(headers.get_str("set-cookie"), Some("b=2"));

        headers.insert("set-cookie", "c=3");
        assert_eq!(headers.get_values("set-cookie").unwrap().len(), 1);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn serialization_is_kebab_case() {
        let mut headers = Headers::new();
        headers.insert("content-length", 11u64);
        headers.insert("x-request-id", "abc");
        assert_eq!(
            headers.to_string(),
            "Content-Length: 11\r\nX-Request-Id: abc\r\n"
        );
    }

    #[test]
    fn parse_ignores_lines_without_colons() {
        let headers =
            Headers::parse(b"Host: example.com\r\nnot a header line\r\nAccept: */*\r\n\r\n")
                .unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get_str("accept"), Some("*/*"));
    }

    #[test]
    fn parse_trims_optional_whitespace() {
        let headers = Headers::parse(b"Content-Length:    42   \r\n").unwrap();
        assert_eq!(headers.content_length().unwrap(), Some(42));
    }

    #[test]
    fn content_length_rejects_garbage() {
        let headers = Headers::parse(b"Content-Length: eleven\r\n").unwrap();
        assert!(headers.content_length().is_err());
    }
}
