use crate::Conn;

/// The next state after a response has been sent on a conn transport.
#[derive(Debug)]
pub enum ConnectionStatus<Transport> {
    /// The transport has been closed, either by the peer or by us
    Close,

    /// Another request has been sent on the same transport and is
    /// ready to respond to. This can occur any number of times and
    /// should be handled in a loop.
    Conn(Conn<Transport>),
}
