//! Framing for one request/response exchange.
//!
//! The client writes the encoded request and shuts down its write half. The server's
//! response ends at whichever comes first:
//!
//! 1. a line consisting solely of [`TERMINATOR`], which is stripped together with the
//!    newline that precedes it, or
//! 2. end of stream, when the server closes the connection after writing.
//!
//! Responses spanning several TCP segments are accumulated until one of these holds.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Request, Response, Result};

/// Sentinel line marking the end of a response.
pub const TERMINATOR: &str = "<eom>";

/// Writes an encoded request and flushes the stream.
pub async fn write_request(output: &mut (impl AsyncWrite + Unpin), request: &Request) -> Result<()> {
	output.write_all(request.encode().as_bytes()).await?;
	output.flush().await?;
	Ok(())
}

/// Reads one framed response.
pub async fn read_response(input: &mut (impl AsyncBufRead + Unpin)) -> Result<Response> {
	let mut raw = Vec::new();
	let mut line = Vec::new();

	loop {
		line.clear();
		let n = input.read_until(b'\n', &mut line).await?;
		if n == 0 {
			break;
		}
		if trim_eol(&line) == TERMINATOR.as_bytes() {
			strip_trailing_eol(&mut raw);
			break;
		}
		raw.extend_from_slice(&line);
	}

	Ok(Response::new(String::from_utf8_lossy(&raw).into_owned()))
}

/// Writes a response followed by the terminator line. Used by in-process test servers.
pub async fn write_response(output: &mut (impl AsyncWrite + Unpin), payload: &str) -> Result<()> {
	output.write_all(payload.as_bytes()).await?;
	output.write_all(b"\n").await?;
	output.write_all(TERMINATOR.as_bytes()).await?;
	output.write_all(b"\n").await?;
	output.flush().await?;
	Ok(())
}

fn trim_eol(line: &[u8]) -> &[u8] {
	let line = line.strip_suffix(b"\n").unwrap_or(line);
	line.strip_suffix(b"\r").unwrap_or(line)
}

fn strip_trailing_eol(raw: &mut Vec<u8>) {
	if raw.last() == Some(&b'\n') {
		raw.pop();
		if raw.last() == Some(&b'\r') {
			raw.pop();
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use tokio::io::{AsyncReadExt, BufReader};

	use super::*;
	use crate::Operation;

	#[tokio::test]
	async fn terminator_ends_the_response() {
		let wire = b"first\nsecond\n<eom>\nleftover";
		let mut reader = BufReader::new(&wire[..]);
		let resp = read_response(&mut reader).await.unwrap();
		assert_eq!(resp.raw(), "first\nsecond");
	}

	#[tokio::test]
	async fn eof_ends_the_response() {
		let wire = b"ready";
		let mut reader = BufReader::new(&wire[..]);
		assert_eq!(read_response(&mut reader).await.unwrap().raw(), "ready");
	}

	#[tokio::test]
	async fn segmented_payload_is_accumulated() {
		let (client, mut server) = tokio::io::duplex(8);
		let writer = tokio::spawn(async move {
			for chunk in ["12\nusing Sys", "tem;\r\n", "class A {}\n", "<eom>\r\n"] {
				server.write_all(chunk.as_bytes()).await.unwrap();
			}
		});
		let mut reader = BufReader::new(client);
		let resp = read_response(&mut reader).await.unwrap();
		writer.await.unwrap();
		assert_eq!(resp.raw(), "12\nusing System;\r\nclass A {}");
	}

	#[tokio::test]
	async fn terminator_text_inside_a_line_is_payload() {
		let wire = b"a <eom> b\n<eom>\n";
		let mut reader = BufReader::new(&wire[..]);
		assert_eq!(read_response(&mut reader).await.unwrap().raw(), "a <eom> b");
	}

	#[tokio::test]
	async fn request_and_response_writers() {
		let mut out = Vec::new();
		write_request(&mut out, &Request::new(3, Operation::Ping)).await.unwrap();
		assert_eq!(out, b"-client:3\n-op:ping");

		let (mut a, mut b) = tokio::io::duplex(64);
		write_response(&mut a, "ready").await.unwrap();
		drop(a);
		let mut text = String::new();
		b.read_to_string(&mut text).await.unwrap();
		assert_eq!(text, "ready\n<eom>\n");
	}
}
