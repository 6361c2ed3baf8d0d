use std::time::Duration;

/// Performance and security configuration for the http protocol
/// layer. The defaults are reasonable for most applications.
#[derive(Clone, Copy, Debug)]
pub struct HttpConfig {
    pub(crate) request_buffer_initial_len: usize,
    pub(crate) response_buffer_len: usize,
    pub(crate) head_max_len: usize,
    pub(crate) copy_loops_per_yield: usize,
    pub(crate) received_body_max_len: u64,
    pub(crate) received_body_initial_len: usize,
    pub(crate) received_body_max_preallocate: usize,
    pub(crate) keep_alive_timeout: Duration,
    pub(crate) read_timeout: Duration,
}

impl HttpConfig {
    /// initial allocation for the per-connection request buffer.
    /// default: 128 bytes
    pub fn with_request_buffer_initial_len(mut self, len: usize) -> Self {
        self.request_buffer_initial_len = len;
        self
    }

    /// allocation for the response head and write coalescing buffer.
    /// default: 512 bytes
    pub fn with_response_buffer_len(mut self, len: usize) -> Self {
        self.response_buffer_len = len;
        self
    }

    /// maximum length of a request head before the connection is
    /// rejected. default: 8kb
    pub fn with_head_max_len(mut self, len: usize) -> Self {
        self.head_max_len = len;
        self
    }

    /// how many read-write loops to perform before yielding back to
    /// the async runtime. default: 16
    pub fn with_copy_loops_per_yield(mut self, loops: usize) -> Self {
        self.copy_loops_per_yield = loops;
        self
    }

    /// maximum length of a received body that will be read into
    /// memory with `read_bytes`/`read_string`. default: 500mb
    pub fn with_received_body_max_len(mut self, len: u64) -> Self {
        self.received_body_max_len = len;
        self
    }

    /// initial allocation for received bodies of unknown length.
    /// default: 128 bytes
    pub fn with_received_body_initial_len(mut self, len: usize) -> Self {
        self.received_body_initial_len = len;
        self
    }

    /// maximum preallocation for received bodies with a declared
    /// content-length, protecting against absurd claimed lengths.
    /// default: 1kb
    pub fn with_received_body_max_preallocate(mut self, len: usize) -> Self {
        self.received_body_max_preallocate = len;
        self
    }

    /// how long an idle keep-alive connection waits for the next
    /// request head before closing. default: 2s
    pub fn with_keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    /// per-read deadline while receiving a body. default: 1s
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// the configured keep-alive timeout
    pub fn keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    /// the configured per-read body deadline
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

pub const DEFAULT_CONFIG: HttpConfig = HttpConfig {
    request_buffer_initial_len: 128,
    response_buffer_len: 512,
    head_max_len: 8 * 1024,
    copy_loops_per_yield: 16,
    received_body_max_len: 524_288_000,
    received_body_initial_len: 128,
    received_body_max_preallocate: 1024,
    keep_alive_timeout: Duration::from_secs(2),
    read_timeout: Duration::from_secs(1),
};
