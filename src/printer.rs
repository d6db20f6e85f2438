use crate::error::CliError;
use anyhow::{Context, Result};
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use serde::de::IgnoredAny;
use std::io::Write;

const INDENT: &[u8] = b"    ";

/// Writes a response body to `out` and turns a non-success status into an error.
///
/// Errors coming from the request itself are passed through untouched so the
/// printer can wrap a call directly: `print_response(out, client.execute(req))`.
pub fn print_response(out: &mut dyn Write, response: Result<Response>) -> Result<()> {
    let response = response?;
    let status = response.status();
    tracing::info!("{}", status);

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.bytes().context("reading response body")?;

    render_body(out, content_type.as_deref(), &body)?;

    if status.is_success() {
        Ok(())
    } else {
        Err(CliError::Status(status).into())
    }
}

pub fn render_body(out: &mut dyn Write, content_type: Option<&str>, body: &[u8]) -> Result<()> {
    if content_type.is_some_and(|ct| ct.contains("json")) {
        serde_json::from_slice::<IgnoredAny>(body).context("decoding JSON response")?;
        out.write_all(&reindent(body))?;
    } else {
        out.write_all(body)?;
    }
    writeln!(out)?;
    Ok(())
}

/// Re-indents an already validated JSON document token by token, so numbers
/// and escapes come out exactly as the server sent them.
fn reindent(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() * 2);
    let mut depth = 0usize;
    let mut opened = false;
    let mut in_string = false;
    let mut escaped = false;

    for &byte in body {
        if in_string {
            out.push(byte);
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        if byte.is_ascii_whitespace() {
            continue;
        }

        // `{}` and `[]` stay on one line.
        if opened {
            opened = false;
            if byte == b'}' || byte == b']' {
                depth = depth.saturating_sub(1);
                out.push(byte);
                continue;
            }
            newline(&mut out, depth);
        }

        match byte {
            b'"' => {
                in_string = true;
                out.push(byte);
            }
            b'{' | b'[' => {
                out.push(byte);
                depth += 1;
                opened = true;
            }
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                newline(&mut out, depth);
                out.push(byte);
            }
            b',' => {
                out.push(byte);
                newline(&mut out, depth);
            }
            b':' => out.extend_from_slice(b": "),
            _ => out.push(byte),
        }
    }
    out
}

fn newline(out: &mut Vec<u8>, depth: usize) {
    out.push(b'\n');
    for _ in 0..depth {
        out.extend_from_slice(INDENT);
    }
}
