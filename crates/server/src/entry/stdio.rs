#![forbid(unsafe_code)]

use super::framing::{
    TransportMode, detect_mode_from_first_line, parse_request, read_content_length_frame,
    write_frame,
};
use crate::{PmServer, SessionLog};
use std::io::{BufRead, BufReader, Write};

pub(crate) fn run_stdio(
    server: &mut PmServer,
    session: &mut SessionLog,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let mut stdout = std::io::stdout().lock();
    serve(server, session, &mut reader, &mut stdout)
}

/// Framing is detected once from the first non-empty line and kept for the whole session.
fn serve<R: BufRead, W: Write>(
    server: &mut PmServer,
    session: &mut SessionLog,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut mode: Option<TransportMode> = None;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            session.note_exit("eof");
            break;
        }
        let current = match mode {
            Some(current) => current,
            None => {
                let Some(detected) = detect_mode_from_first_line(&line) else {
                    continue;
                };
                tracing::debug!(mode = detected.as_str(), "transport detected");
                session.note_mode(detected.as_str());
                mode = Some(detected);
                detected
            }
        };

        let body = match current {
            TransportMode::NewlineJson => {
                let raw = line.trim();
                if raw.is_empty() {
                    continue;
                }
                raw.as_bytes().to_vec()
            }
            TransportMode::ContentLength => {
                if line.trim().is_empty() {
                    continue;
                }
                match read_content_length_frame(reader, line)? {
                    Some(body) => body,
                    None => {
                        session.note_exit("eof mid-frame");
                        break;
                    }
                }
            }
        };

        let request = match parse_request(&body) {
            Ok(request) => request,
            Err(resp) => {
                session.note_error("malformed request");
                write_frame(writer, current, &resp)?;
                continue;
            }
        };
        session.note_method(&request.method);
        if let Some(resp) = server.handle(request) {
            write_frame(writer, current, &resp)?;
        }
    }

    Ok(())
}
