use tracing::debug;

use crate::error::{FtpError, FtpResult};
use crate::session::FtpSession;
use crate::status;

/// Changes the working directory with CWD
///
/// # Errors
///
/// Returns an error if the server answers with anything but a 2xx reply,
/// typically 550 for a missing directory.
pub async fn cwd(session: &mut FtpSession, path: &str) -> FtpResult<()> {
    let reply = session.channel.expect(&format!("CWD {path}"), 2).await?;
    debug!("Working directory changed to {:?}: {}", path, reply);
    Ok(())
}

/// Asks for the working directory with PWD
///
/// The path is the quoted part of the `257` reply, with doubled quotes
/// collapsed.
pub async fn pwd(session: &mut FtpSession) -> FtpResult<String> {
    let reply = session.channel.expect("PWD", 2).await?;
    if reply.code != status::PATH_CREATED {
        return Err(FtpError::UnexpectedReply {
            command: "PWD".to_string(),
            reply,
        });
    }
    parse_quoted_path(reply.text())
        .ok_or_else(|| FtpError::MalformedReply(reply.text().to_string()))
}

fn parse_quoted_path(text: &str) -> Option<String> {
    let rest = &text[text.find('"')? + 1..];
    let mut path = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                path.push('"');
            } else {
                return Some(path);
            }
        } else {
            path.push(c);
        }
    }
    None
}
