use crate::{server::copier::Copier, traffic::TrafficReporter};
use log::warn;
use socket2::SockRef;
use std::net::Shutdown;
use tokio::{
    io::AsyncWriteExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

/// Shuts both directions of the socket backing `half` down at the kernel
/// level. `OwnedReadHalf`/`OwnedWriteHalf` share the same underlying file
/// descriptor, so this also unblocks a pending read/write on the other
/// owned half of the same stream, from whichever task is parked on it.
fn force_close_read(half: &OwnedReadHalf) {
    let _ = SockRef::from(half).shutdown(Shutdown::Both);
}

/// See [`force_close_read`].
fn force_close_write(half: &OwnedWriteHalf) {
    let _ = SockRef::from(half).shutdown(Shutdown::Both);
}

/// Runs the two relay halves concurrently until both sides have finished.
///
/// Each half copies one direction, half-closes the destination write side on
/// EOF/error, and reports its byte count (0 on error) to its own reporter.
/// A copy error terminates the *whole* connection: both the client and
/// target sockets are forced closed (not merely half-closed) so the other,
/// still-running direction unblocks immediately instead of waiting forever
/// on a peer this relay has already given up on. This mirrors
/// `forwardRequest`/`forwardResponse` returning their first error to a
/// shared channel whose reader then closes both `conn` and `target`.
/// Returns `(request_bytes, response_bytes)` for the caller to log and
/// report.
pub async fn relay(
    client: TcpStream,
    target: TcpStream,
    identity: &str,
    request_copier: &dyn Copier,
    response_copier: &dyn Copier,
    request_reporter: Option<&dyn TrafficReporter>,
    response_reporter: Option<&dyn TrafficReporter>,
) -> (u64, u64) {
    let (mut client_read, mut client_write) = client.into_split();
    let (mut target_read, mut target_write) = target.into_split();

    let forward_request = async {
        let result = request_copier.copy(&mut target_write, &mut client_read).await;
        let _ = target_write.shutdown().await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("request copy for '{}' ended with error: {}", identity, err);
                force_close_read(&client_read);
                force_close_write(&target_write);
                0
            }
        };

        if let Some(reporter) = request_reporter {
            reporter.report(identity, bytes);
        }

        bytes
    };

    let forward_response = async {
        let result = response_copier.copy(&mut client_write, &mut target_read).await;
        let _ = client_write.shutdown().await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("response copy for '{}' ended with error: {}", identity, err);
                force_close_read(&target_read);
                force_close_write(&client_write);
                0
            }
        };

        if let Some(reporter) = response_reporter {
            reporter.report(identity, bytes);
        }

        bytes
    };

    tokio::join!(forward_request, forward_response)
}
