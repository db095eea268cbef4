//! Control-channel framing: commands out, (possibly multi-line) replies in.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::error::{FtpError, FtpResult};
use crate::types::Reply;

/// Command/reply codec over the control connection
#[derive(Debug)]
pub(crate) struct ControlChannel<S> {
    stream: BufReader<S>,
    timeout: Duration,
}

impl<S> ControlChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
        }
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub(crate) fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Sends `command` terminated by CRLF
    pub(crate) async fn send(&mut self, command: &str) -> FtpResult<()> {
        trace!("CC OUT: {}", redact(command));
        let line = format!("{command}\r\n");
        let stream = &mut self.stream;
        bounded(self.timeout, "sending a command", async move {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
            Ok::<_, FtpError>(())
        })
        .await
    }

    /// Reads one complete reply
    ///
    /// A reply whose first line reads `NNN-` continues until a line starting
    /// with `NNN ` (or consisting of `NNN` alone).
    pub(crate) async fn read_reply(&mut self) -> FtpResult<Reply> {
        let first = self.read_line().await?;
        let code = parse_code(&first)?;
        let mut lines = vec![first];

        if lines[0].as_bytes().get(3) == Some(&b'-') {
            let prefix = &lines[0][..3];
            let terminator = format!("{prefix} ");
            let bare = prefix.to_string();
            loop {
                let line = self.read_line().await?;
                let done = line.starts_with(&terminator) || line == bare;
                lines.push(line);
                if done {
                    break;
                }
            }
        }

        Ok(Reply::new(code, lines))
    }

    pub(crate) async fn execute(&mut self, command: &str) -> FtpResult<Reply> {
        self.send(command).await?;
        self.read_reply().await
    }

    /// Executes `command` and requires a reply of the given class (first digit)
    pub(crate) async fn expect(&mut self, command: &str, class: u16) -> FtpResult<Reply> {
        let reply = self.execute(command).await?;
        if reply.code / 100 != class {
            return Err(FtpError::UnexpectedReply {
                command: redact(command).to_string(),
                reply,
            });
        }
        Ok(reply)
    }

    pub(crate) async fn shutdown(&mut self) -> FtpResult<()> {
        let stream = &mut self.stream;
        bounded(self.timeout, "closing the connection", async move {
            stream.shutdown().await?;
            Ok::<_, FtpError>(())
        })
        .await
    }

    async fn read_line(&mut self) -> FtpResult<String> {
        let mut buf = Vec::new();
        let stream = &mut self.stream;
        let read = bounded(self.timeout, "waiting for a reply", async {
            Ok::<_, FtpError>(stream.read_until(b'\n', &mut buf).await?)
        })
        .await?;
        if read == 0 || buf.last() != Some(&b'\n') {
            return Err(FtpError::Disconnected);
        }
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        trace!("CC IN: {}", line);
        Ok(line)
    }
}

/// Runs `fut`, failing with [`FtpError::Timeout`] when it exceeds `limit`
pub(crate) async fn bounded<T, F>(limit: Duration, what: &'static str, fut: F) -> FtpResult<T>
where
    F: Future<Output = FtpResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| FtpError::Timeout(limit, what))?
}

fn parse_code(line: &str) -> FtpResult<u16> {
    let digits = line.get(..3).ok_or_else(|| FtpError::MalformedReply(line.to_string()))?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FtpError::MalformedReply(line.to_string()));
    }
    match line.as_bytes().get(3) {
        None | Some(b' ') | Some(b'-') => {}
        Some(_) => return Err(FtpError::MalformedReply(line.to_string())),
    }
    digits
        .parse()
        .map_err(|_| FtpError::MalformedReply(line.to_string()))
}

/// Hides the argument of `PASS` in logs and errors
pub(crate) fn redact(command: &str) -> &str {
    if command
        .get(..4)
        .is_some_and(|verb| verb.eq_ignore_ascii_case("PASS"))
    {
        "PASS ****"
    } else {
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn reads_single_line_reply() {
        let mock = Builder::new().read(b"220 Service Ready. \r\n").build();
        let mut channel = ControlChannel::new(mock, TIMEOUT);

        let reply = channel.read_reply().await.unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.lines, vec!["220 Service Ready. ".to_string()]);
    }

    #[tokio::test]
    async fn reads_multi_line_reply_split_across_reads() {
        let mock = Builder::new()
            .read(b"230-Welcome\r\n230-second ")
            .read(b"line\r\n 230 not the end\r\n230 Logged in\r\n")
            .build();
        let mut channel = ControlChannel::new(mock, TIMEOUT);

        let reply = channel.read_reply().await.unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(reply.lines.len(), 4);
        assert_eq!(reply.lines[2], " 230 not the end");
        assert_eq!(reply.text(), "Logged in");
    }

    #[tokio::test]
    async fn accepts_lf_only_terminators() {
        let mock = Builder::new().read(b"200 Type set to I\n").build();
        let mut channel = ControlChannel::new(mock, TIMEOUT);

        let reply = channel.read_reply().await.unwrap();
        assert_eq!(reply.lines, vec!["200 Type set to I".to_string()]);
    }

    #[tokio::test]
    async fn execute_writes_crlf_terminated_command() {
        let mock = Builder::new()
            .write(b"TYPE I\r\n")
            .read(b"200 OK\r\n")
            .build();
        let mut channel = ControlChannel::new(mock, TIMEOUT);

        let reply = channel.execute("TYPE I").await.unwrap();
        assert_eq!(reply.code, 200);
    }

    #[tokio::test]
    async fn expect_rejects_other_class() {
        let mock = Builder::new()
            .write(b"CWD /nope\r\n")
            .read(b"550 No such directory\r\n")
            .build();
        let mut channel = ControlChannel::new(mock, TIMEOUT);

        let err = channel.expect("CWD /nope", 2).await.unwrap_err();
        assert_eq!(err.reply_code(), Some(550));
    }

    #[tokio::test]
    async fn eof_is_disconnected() {
        let mock = Builder::new().read(b"220 partial").build();
        let mut channel = ControlChannel::new(mock, TIMEOUT);

        assert!(matches!(
            channel.read_reply().await,
            Err(FtpError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let mock = Builder::new().read(b"hello there\r\n").build();
        let mut channel = ControlChannel::new(mock, TIMEOUT);

        assert!(matches!(
            channel.read_reply().await,
            Err(FtpError::MalformedReply(_))
        ));
    }

    #[test]
    fn password_is_redacted() {
        assert_eq!(redact("PASS secret"), "PASS ****");
        assert_eq!(redact("pass secret"), "PASS ****");
        assert_eq!(redact("USER jt"), "USER jt");
    }

    #[test]
    fn code_parsing() {
        assert_eq!(parse_code("250 Okay").unwrap(), 250);
        assert_eq!(parse_code("250").unwrap(), 250);
        assert!(parse_code("25").is_err());
        assert!(parse_code("2500 x").is_err());
    }
}
