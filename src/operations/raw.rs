use tracing::debug;

use crate::codec::redact;
use crate::error::FtpResult;
use crate::session::FtpSession;
use crate::types::Reply;

/// Sends `command` verbatim and returns the complete reply
///
/// The reply code is not interpreted: a 5xx answer is still a successful
/// round trip. Only transport failures are errors.
pub async fn raw(session: &mut FtpSession, command: &str) -> FtpResult<Reply> {
    debug!("Sending raw command: {}", redact(command));
    let reply = session.channel.execute(command).await?;
    debug!("Raw command answered with {}", reply);
    Ok(reply)
}
