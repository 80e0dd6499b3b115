//! Loopback receiver for the OAuth redirect
//!
//! Google redirects the browser to `http://localhost:<port>/?code=...`. We
//! accept exactly one connection, answer it with a small HTML page and hand
//! the query parameters to the service.

use anyhow::{Context, Result};
use log::debug;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::ops::RangeInclusive;
use unclutter_mail::CallbackParams;
use url::Url;

/// Ports tried in order when binding the callback listener
pub const PORT_RANGE: RangeInclusive<u16> = 8080..=8090;

/// Bind the first free loopback port in [`PORT_RANGE`]
pub fn bind_loopback() -> Result<(TcpListener, u16)> {
    for port in PORT_RANGE {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok((listener, port));
        }
    }
    anyhow::bail!(
        "Could not bind to any port in range {}-{}",
        PORT_RANGE.start(),
        PORT_RANGE.end()
    )
}

/// Redirect URI matching a listener from [`bind_loopback`]
pub fn redirect_uri(port: u16) -> String {
    format!("http://localhost:{}", port)
}

/// Block until the browser hits the listener and return its query parameters
pub fn wait_for_callback(listener: TcpListener) -> Result<CallbackParams> {
    let (mut stream, peer) = listener.accept().context("Failed to accept connection")?;
    debug!("OAuth callback connection from {}", peer);

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .context("Failed to read request")?;

    let params = parse_request_line(&request_line)?;

    let (status, body) = if params.code.is_some() {
        ("200 OK", "Signed in to UnClutter. You can close this window.")
    } else {
        ("400 Bad Request", "Sign-in failed. Please try again.")
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    // The browser page is cosmetic; the login proceeds even if it can't be written
    stream.write_all(response.as_bytes()).ok();

    Ok(params)
}

/// Extract callback parameters from `GET /?code=...&scope=... HTTP/1.1`
fn parse_request_line(line: &str) -> Result<CallbackParams> {
    let target = line
        .split_whitespace()
        .nth(1)
        .context("Malformed HTTP request line")?;

    let url = Url::parse("http://localhost")
        .and_then(|base| base.join(target))
        .with_context(|| format!("Invalid callback target: {}", target))?;

    Ok(CallbackParams::from_query(url.query().unwrap_or("")))
}
