//! Pass-through buffering for chunk streams.

/// Iterator adapter that re-yields every chunk of `inner` unchanged while
/// appending it to an owned buffer.
///
/// Errors pass through without touching the buffer. Once the inner iterator
/// is exhausted, `take_buffer` hands back the concatenated text.
///
/// # Examples
///
/// ```
/// use lexis::stream::Buffered;
///
/// let chunks = vec![Ok::<_, ()>("{\"a\"".to_string()), Ok(":1}".to_string())];
/// let mut buffered = Buffered::new(chunks.into_iter());
///
/// let seen: Vec<_> = buffered.by_ref().map(|c| c.unwrap()).collect();
/// assert_eq!(seen, vec!["{\"a\"", ":1}"]);
/// assert_eq!(buffered.take_buffer(), "{\"a\":1}");
/// ```
pub struct Buffered<I> {
    inner: I,
    buffer: String,
    chunks: usize,
}

impl<I> Buffered<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            buffer: String::new(),
            chunks: 0,
        }
    }

    /// Number of chunks passed through so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Moves the accumulated text out, leaving the buffer empty.
    pub fn take_buffer(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

impl<I, E> Iterator for Buffered<I>
where
    I: Iterator<Item = Result<String, E>>,
{
    type Item = Result<String, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        if let Ok(chunk) = &item {
            self.buffer.push_str(chunk);
            self.chunks += 1;
        }
        Some(item)
    }
}
