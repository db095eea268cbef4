use std::path::PathBuf;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::data;
use crate::error::{FtpError, FtpResult};
use crate::session::FtpSession;
use crate::types::{FileMetadata, FileType};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Runs LIST over a data connection and returns the listing lines
///
/// # Arguments
///
/// * `session` - The logged in session
/// * `path` - Directory to list, the working directory when `None`
/// * `cancel_token` - Token for cancelling the transfer
///
/// # Errors
///
/// Returns an error if:
/// - The data connection cannot be negotiated or opened
/// - The server refuses the listing or does not confirm its completion
/// - The operation is cancelled by the user
pub async fn list(
    session: &mut FtpSession,
    path: Option<&str>,
    cancel_token: CancellationToken,
) -> FtpResult<Vec<String>> {
    let command = match path {
        Some(path) => format!("LIST {path}"),
        None => "LIST".to_string(),
    };
    let (mut stream, opened) = data::open(session, &command).await?;
    debug!("Listing transfer started: {}", opened);

    let timeout = session.timeout;
    let mut buf = BytesMut::with_capacity(8 * 1024);
    let mut cancelled = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                info!("LIST cancelled by user");
                cancelled = true;
                break;
            }
            read = tokio::time::timeout(timeout, stream.read_buf(&mut buf)) => {
                match read {
                    Ok(Ok(0)) => break,
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => return Err(FtpError::DataChannel(e)),
                    Err(_) => return Err(FtpError::Timeout(timeout, "reading the listing")),
                }
            }
        }
    }
    drop(stream);

    if cancelled {
        abort(session).await;
        return Err(FtpError::Cancelled);
    }

    let done = session.channel.read_reply().await?;
    if !done.is_completion() {
        return Err(FtpError::UnexpectedReply {
            command,
            reply: done,
        });
    }
    debug!("Listing transfer finished: {} ({} bytes)", done, buf.len());

    Ok(String::from_utf8_lossy(&buf)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Lists a remote directory and parses each entry
///
/// Entries `.` and `..` and `total` lines are skipped. Lines that are not in
/// a recognised format come back as [`FileType::Unknown`] entries named after
/// the whole line.
pub async fn ls(
    session: &mut FtpSession,
    path: Option<&str>,
    cancel_token: CancellationToken,
) -> FtpResult<Vec<FileMetadata>> {
    let lines = list(session, path, cancel_token).await?;
    Ok(parse_listing(&lines, path.unwrap_or("")))
}

/// Ends a cancelled transfer and leaves the control channel in step
///
/// The server first finishes the transfer (226, 426 or 451) and only then
/// answers ABOR on its own, so both replies are read.
async fn abort(session: &mut FtpSession) {
    match session.channel.read_reply().await {
        Ok(reply) => debug!("Cancelled transfer ended with {}", reply),
        Err(e) => debug!("No final reply for the cancelled transfer: {}", e),
    }
    match session.channel.execute("ABOR").await {
        Ok(reply) => debug!("ABOR answered with {}", reply),
        Err(e) => debug!("ABOR failed: {}", e),
    }
}

pub(crate) fn parse_listing(lines: &[String], base: &str) -> Vec<FileMetadata> {
    lines
        .iter()
        .filter_map(|line| parse_line(line.trim_end(), base))
        .filter(|entry| entry.name != "." && entry.name != "..")
        .collect()
}

fn parse_line(line: &str, base: &str) -> Option<FileMetadata> {
    if line.trim().is_empty() || is_total_line(line) {
        return None;
    }
    if let Some(entry) = parse_unix(line, base) {
        return Some(entry);
    }
    Some(FileMetadata {
        name: line.to_string(),
        path: PathBuf::from(base).join(line),
        size: None,
        file_type: FileType::Unknown,
        permissions: None,
        link_target: None,
        raw: line.to_string(),
    })
}

fn is_total_line(line: &str) -> bool {
    line.strip_prefix("total ")
        .is_some_and(|n| n.trim().bytes().all(|b| b.is_ascii_digit()))
}

/// `ls -l` style, with or without the link-count column:
///
/// ```text
/// drwxr-xr-x 2 jt staff 4096 Jan  1 12:00 docs
/// -rw-r--r-- jt staff 120 Jan 01 15:05 notes.txt
/// ```
fn parse_unix(line: &str, base: &str) -> Option<FileMetadata> {
    let tokens = tokens(line);
    let (_, permissions) = *tokens.first()?;
    if permissions.len() != 10 || !permissions.is_ascii() {
        return None;
    }
    let file_type = match permissions.as_bytes()[0] {
        b'd' => FileType::Directory,
        b'l' | b'L' => FileType::Symlink,
        b'-' => FileType::Regular,
        b'b' | b'c' | b'p' | b's' => FileType::Unknown,
        _ => return None,
    };

    // The month anchors the remaining columns: size before it, then day and
    // time or year, then the name
    let month = tokens
        .iter()
        .enumerate()
        .skip(3)
        .find(|(i, (_, token))| {
            MONTHS.contains(&token.to_ascii_lowercase().as_str())
                && tokens[i - 1].1.parse::<u64>().is_ok()
        })
        .map(|(i, _)| i)?;
    let (name_start, _) = *tokens.get(month + 3)?;
    let size = tokens[month - 1].1.parse::<u64>().ok();

    let rest = &line[name_start..];
    let (name, link_target) = match (file_type, rest.split_once(" -> ")) {
        (FileType::Symlink, Some((name, target))) => (name, Some(target.to_string())),
        _ => (rest, None),
    };

    Some(FileMetadata {
        name: name.to_string(),
        path: PathBuf::from(base).join(name),
        size,
        file_type,
        permissions: Some(permissions.to_string()),
        link_target,
        raw: line.to_string(),
    })
}

/// Whitespace separated tokens with their byte offsets
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, &line[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((s, &line[s..]));
    }
    out
}
