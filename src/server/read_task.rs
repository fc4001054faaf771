//! Reads request frames from a connection and forwards them to a
//! [`crate::server::serve_task::ServeTask`].

use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use super::RequestResult;
use crate::wire;

pub(crate) struct ReadTask {
    read_half: OwnedReadHalf,
    requests: UnboundedSender<RequestResult>,
}

impl ReadTask {
    pub fn spawn(read_half: OwnedReadHalf, requests: UnboundedSender<RequestResult>) -> JoinHandle<()> {
        tokio::spawn(Self { read_half, requests }.run())
    }

    async fn run(mut self) {
        loop {
            match wire::read_frame(&mut self.read_half).await {
                Ok(Some(payload)) => {
                    let decoded = wire::decode_request(&payload);
                    let poisoned = decoded.is_err();
                    if self.requests.send(decoded).is_err() || poisoned {
                        return;
                    }
                }
                // Clean end of stream: the peer is done.
                Ok(None) => return,
                Err(err) => {
                    debug!(%err, "dropping connection after a framing error");
                    let _ = self.requests.send(Err(err));
                    return;
                }
            }
        }
    }
}
