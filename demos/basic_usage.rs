// demos/basic_usage.rs
// Run with: cargo run --example basic_usage

use std::time::Duration;

use ftp_probe::{CancellationToken, FileType, FtpSession, SessionOption, TransferType};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Connect to the FTP server
    let mut session = FtpSession::connect("localhost", 9090, Duration::from_secs(10)).await?;
    println!("Connected: {}", session.welcome());

    // 2. Dial the control connection's address for data, whatever PASV says
    session.set_option(SessionOption::UsePasvAddress(false))?;

    // 3. Log in and move to the root directory
    session.login("jt", "test").await?;
    session.chdir("/").await?;
    println!("Working directory: {}", session.pwd().await?);

    // 4. Passive mode, binary transfers
    session.set_passive(true).await?;
    session.transfer_type(TransferType::Binary).await?;

    // 5. List the directory
    let entries = session.ls(None, CancellationToken::new()).await?;
    for entry in &entries {
        let marker = match entry.file_type {
            FileType::Directory => "dir ",
            FileType::Symlink => "link",
            _ => "file",
        };
        println!("  {} {:?} ({} bytes)", marker, entry.path, entry.size.unwrap_or(0));
    }
    println!("Found {} entries", entries.len());

    // 6. Raw commands come back with the server's reply, whatever its code
    let reply = session.raw("SYST").await?;
    println!("SYST -> {}", reply);

    // 7. Cleanup
    session.close().await?;
    println!("Done");

    Ok(())
}
