//! Data-connection negotiation for both passive and active mode.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::codec::bounded;
use crate::error::{FtpError, FtpResult};
use crate::session::FtpSession;
use crate::status;
use crate::types::{Mode, Reply};

/// Parses the `h1,h2,h3,h4,p1,p2` address of a `227` reply
///
/// Parentheses around the tuple are optional.
pub(crate) fn parse_pasv_reply(reply: &Reply) -> FtpResult<SocketAddrV4> {
    let line = reply.lines.last().map(String::as_str).unwrap_or("");
    let body = line.get(4..).unwrap_or("");
    let tuple = body
        .split(|c: char| !(c.is_ascii_digit() || c == ','))
        .find(|run| run.matches(',').count() == 5)
        .ok_or_else(|| FtpError::PassiveAddress(line.to_string()))?;

    let mut octets = [0u8; 6];
    for (slot, part) in octets.iter_mut().zip(tuple.split(',')) {
        *slot = part
            .parse()
            .map_err(|_| FtpError::PassiveAddress(line.to_string()))?;
    }

    let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = u16::from(octets[4]) << 8 | u16::from(octets[5]);
    Ok(SocketAddrV4::new(ip, port))
}

/// Picks the address to dial for a passive data connection
pub(crate) fn passive_target(
    advertised: SocketAddrV4,
    peer: SocketAddr,
    use_pasv_address: bool,
) -> SocketAddr {
    if use_pasv_address {
        SocketAddr::V4(advertised)
    } else {
        SocketAddr::new(peer.ip(), advertised.port())
    }
}

/// Builds the PORT (IPv4) or EPRT (IPv6) command announcing `addr`
pub(crate) fn port_command(addr: SocketAddr) -> String {
    match addr {
        SocketAddr::V4(v4) => {
            let [a, b, c, d] = v4.ip().octets();
            let port = v4.port();
            format!("PORT {},{},{},{},{},{}", a, b, c, d, port >> 8, port & 0xff)
        }
        SocketAddr::V6(v6) => format!("EPRT |2|{}|{}|", v6.ip(), v6.port()),
    }
}

/// Sends PASV and returns the address to dial for the next data command
pub(crate) async fn request_passive(session: &mut FtpSession) -> FtpResult<SocketAddr> {
    let reply = session.channel.expect("PASV", 2).await?;
    if reply.code != status::ENTERING_PASSIVE_MODE {
        return Err(FtpError::UnexpectedReply {
            command: "PASV".to_string(),
            reply,
        });
    }
    let advertised = parse_pasv_reply(&reply)?;
    let target = passive_target(advertised, session.peer, session.use_pasv_address);
    if SocketAddr::V4(advertised) != target {
        debug!(%advertised, %target, "Ignoring address advertised in PASV reply");
    }
    Ok(target)
}

/// Sends `command` and opens the data connection it transfers over
///
/// Returns the connected stream and the server's preliminary reply.
pub(crate) async fn open(
    session: &mut FtpSession,
    command: &str,
) -> FtpResult<(TcpStream, Reply)> {
    match session.mode {
        Mode::Passive => open_passive(session, command).await,
        Mode::Active => open_active(session, command).await,
    }
}

async fn open_passive(
    session: &mut FtpSession,
    command: &str,
) -> FtpResult<(TcpStream, Reply)> {
    let target = match session.pending_passive.take() {
        Some(target) => target,
        None => request_passive(session).await?,
    };
    session.channel.send(command).await?;

    debug!(%target, "Opening passive data connection");
    let connected = bounded(session.timeout, "opening the data connection", async {
        TcpStream::connect(target)
            .await
            .map_err(FtpError::DataChannel)
    })
    .await;

    let stream = match connected {
        Ok(stream) => stream,
        Err(err) => {
            // The server may already have refused the command
            if let Ok(reply) = session.channel.read_reply().await {
                preliminary(command, reply)?;
            }
            return Err(err);
        }
    };
    let reply = preliminary(command, session.channel.read_reply().await?)?;
    Ok((stream, reply))
}

async fn open_active(session: &mut FtpSession, command: &str) -> FtpResult<(TcpStream, Reply)> {
    let local_ip = session.channel.get_ref().local_addr()?.ip();
    let listener = TcpListener::bind((local_ip, 0))
        .await
        .map_err(FtpError::DataChannel)?;
    let announced = listener.local_addr().map_err(FtpError::DataChannel)?;

    session.channel.expect(&port_command(announced), 2).await?;
    session.channel.send(command).await?;
    let reply = preliminary(command, session.channel.read_reply().await?)?;

    let (stream, from) = bounded(
        session.timeout,
        "waiting for the server's data connection",
        async { listener.accept().await.map_err(FtpError::DataChannel) },
    )
    .await?;
    if from.ip() != session.peer.ip() {
        warn!(%from, peer = %session.peer, "Data connection from unexpected address");
    }
    Ok((stream, reply))
}

fn preliminary(command: &str, reply: Reply) -> FtpResult<Reply> {
    // 125 or 150 in practice
    if reply.is_preliminary() {
        return Ok(reply);
    }
    Err(FtpError::UnexpectedReply {
        command: command.to_string(),
        reply,
    })
}
