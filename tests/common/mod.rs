//! A scripted FTP server for driving the client in tests.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the mock server answers
#[derive(Debug, Clone)]
pub struct Script {
    pub welcome: String,
    pub user: String,
    pub password: String,
    /// Directories CWD accepts
    pub directories: Vec<String>,
    /// Address advertised in PASV replies; `None` advertises the real one
    pub advertised_ip: Option<Ipv4Addr>,
    pub listing: Vec<String>,
    /// Answer PASV with 502
    pub refuse_pasv: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            welcome: "220 Service Ready. ".to_string(),
            user: "jt".to_string(),
            password: "test".to_string(),
            directories: vec!["/".to_string(), "/pub".to_string()],
            advertised_ip: None,
            listing: vec![
                "drwxr-xr-x jt staff 4096 Jan 01 15:05 pub".to_string(),
                "-rw-r--r-- jt staff 57 Jan 01 15:05 readme.txt".to_string(),
            ],
            refuse_pasv: false,
        }
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Starts a server that serves exactly one control connection
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let recorded = commands.clone();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve(stream, script, recorded).await;
        });
        Self {
            addr,
            commands,
            handle,
        }
    }

    /// Waits for the client to go away and returns every command it sent
    pub async fn finish(self) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("mock server did not finish")
            .unwrap();
        self.commands.lock().unwrap().clone()
    }
}

async fn serve(stream: TcpStream, script: Script, commands: Arc<Mutex<Vec<String>>>) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut passive: Option<TcpListener> = None;
    let mut active: Option<SocketAddr> = None;
    let mut user_ok = false;

    reply(&mut write, &script.welcome).await;

    while let Ok(Some(line)) = lines.next_line().await {
        commands.lock().unwrap().push(line.clone());
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };

        match verb.as_str() {
            "USER" => {
                user_ok = arg == script.user;
                reply(&mut write, "331 Username ok, send password.").await;
            }
            "PASS" if user_ok && arg == script.password => {
                reply(&mut write, "230 Login successful.").await;
            }
            "PASS" => reply(&mut write, "530 Not logged in.").await,
            "CWD" if script.directories.contains(&arg) => {
                reply(&mut write, "250 Directory successfully changed.").await;
            }
            "CWD" => reply(&mut write, "550 Failed to change directory.").await,
            "PWD" => reply(&mut write, "257 \"/\" is the current directory").await,
            "TYPE" => reply(&mut write, &format!("200 Type set to {arg}.")).await,
            "NOOP" => reply(&mut write, "200 NOOP ok.").await,
            "PASV" if script.refuse_pasv => {
                reply(&mut write, "502 Command not implemented.").await;
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                let ip = script.advertised_ip.unwrap_or(Ipv4Addr::LOCALHOST);
                let [a, b, c, d] = ip.octets();
                passive = Some(listener);
                active = None;
                reply(
                    &mut write,
                    &format!(
                        "227 Entering Passive Mode ({a},{b},{c},{d},{},{}).",
                        port >> 8,
                        port & 0xff
                    ),
                )
                .await;
            }
            "PORT" => {
                let parts: Vec<u16> = arg.split(',').map(|p| p.parse().unwrap()).collect();
                let ip = Ipv4Addr::new(
                    parts[0] as u8,
                    parts[1] as u8,
                    parts[2] as u8,
                    parts[3] as u8,
                );
                active = Some(SocketAddr::from((ip, parts[4] << 8 | parts[5])));
                passive = None;
                reply(&mut write, "200 PORT command successful.").await;
            }
            "LIST" => {
                let data = if let Some(listener) = passive.take() {
                    reply(&mut write, "150 Here comes the directory listing.").await;
                    tokio::time::timeout(Duration::from_millis(500), listener.accept())
                        .await
                        .ok()
                        .and_then(Result::ok)
                        .map(|(stream, _)| stream)
                } else if let Some(target) = active.take() {
                    reply(&mut write, "150 Here comes the directory listing.").await;
                    TcpStream::connect(target).await.ok()
                } else {
                    reply(&mut write, "425 Use PORT or PASV first.").await;
                    continue;
                };

                match data {
                    Some(mut data) => {
                        let body: String =
                            script.listing.iter().map(|l| format!("{l}\r\n")).collect();
                        // The client may have hung up on a cancelled transfer
                        let _ = data.write_all(body.as_bytes()).await;
                        let _ = data.shutdown().await;
                        drop(data);
                        reply(&mut write, "226 Directory send OK.").await;
                    }
                    None => reply(&mut write, "425 Can't open data connection.").await,
                }
            }
            "QUIT" => {
                reply(&mut write, "221 Goodbye.").await;
                break;
            }
            _ => reply(&mut write, "502 Command not implemented.").await,
        }
    }
}

async fn reply(write: &mut tokio::net::tcp::OwnedWriteHalf, line: &str) {
    // The client may already be gone
    let _ = write.write_all(format!("{line}\r\n").as_bytes()).await;
}
