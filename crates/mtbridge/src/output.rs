use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mtbridge_exchange::ExchangeBuffer;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    endpoint: &'a str,
    size: usize,
    ints: &'a [i64],
    reals: &'a [f64],
    texts: &'a [String],
}

#[derive(Serialize)]
struct ProbeOutput<'a> {
    endpoint: &'a str,
    ok: bool,
    rtt_us: u128,
}

/// Print a decoded reply. `Raw` writes the wire bytes unchanged.
pub fn print_reply(endpoint: &str, wire: &[u8], buffer: &ExchangeBuffer, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                endpoint,
                size: wire.len(),
                ints: buffer.ints(),
                reals: buffer.reals(),
                texts: buffer.texts(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MEMBER", "INDEX", "VALUE"]);
            for (member, index, value) in buffer_rows(buffer) {
                table.add_row(vec![member.to_string(), index.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "endpoint={} size={} ints={:?} reals={:?} texts={:?}",
                endpoint,
                wire.len(),
                buffer.ints(),
                buffer.reals(),
                buffer.texts()
            );
        }
        OutputFormat::Raw => print_raw(wire),
    }
}

pub fn print_probe(endpoint: &str, rtt: std::time::Duration, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out = ProbeOutput {
                endpoint,
                ok: true,
                rtt_us: rtt.as_micros(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["ENDPOINT", "STATUS", "RTT"])
                .add_row(vec![
                    endpoint.to_string(),
                    "ok".to_string(),
                    format!("{rtt:?}"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("endpoint={endpoint} probe=ok rtt={rtt:?}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn buffer_rows(buffer: &ExchangeBuffer) -> Vec<(&'static str, usize, String)> {
    let ints = buffer
        .ints()
        .iter()
        .enumerate()
        .map(|(i, v)| ("ints", i, v.to_string()));
    let reals = buffer
        .reals()
        .iter()
        .enumerate()
        .map(|(i, v)| ("reals", i, v.to_string()));
    let texts = buffer
        .texts()
        .iter()
        .enumerate()
        .map(|(i, v)| ("texts", i, v.clone()));
    ints.chain(reals).chain(texts).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_list_members_in_wire_order() {
        let buffer = ExchangeBuffer::from_parts(vec![600, 1], vec![1.5], vec!["ok".to_string()]);
        let rows = buffer_rows(&buffer);
        assert_eq!(
            rows,
            vec![
                ("ints", 0, "600".to_string()),
                ("ints", 1, "1".to_string()),
                ("reals", 0, "1.5".to_string()),
                ("texts", 0, "ok".to_string()),
            ]
        );
    }

    #[test]
    fn json_reply_shape() {
        let buffer = ExchangeBuffer::from_parts(vec![1], vec![], vec![]);
        let out = ReplyOutput {
            endpoint: "127.0.0.1:8000",
            size: 4,
            ints: buffer.ints(),
            reals: buffer.reals(),
            texts: buffer.texts(),
        };
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(
            json,
            r#"{"endpoint":"127.0.0.1:8000","size":4,"ints":[1],"reals":[],"texts":[]}"#
        );
    }
}
