use std::fmt::Write as _;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use raspio_codec::{Ack, Payload};
use serde::Serialize;
use serde_json::Value;

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
struct AckOutput<'a> {
    operation: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    handle: Option<&'a str>,
    ack: bool,
    data: &'a Value,
}

#[derive(Serialize)]
struct BytesOutput<'a> {
    operation: &'a str,
    size: usize,
    hex: String,
    base64: String,
}

#[derive(Serialize)]
struct CountOutput<'a> {
    operation: &'a str,
    written: u64,
}

pub fn print_ack(operation: &str, ack: &Ack, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&AckOutput {
            operation,
            handle: ack.handle.as_deref(),
            ack: ack.ack,
            data: &ack.data,
        }),
        OutputFormat::Table => print_table(
            &["OPERATION", "ACK", "DATA"],
            vec![operation.to_string(), ack.ack.to_string(), data_text(&ack.data)],
        ),
        OutputFormat::Pretty => {
            println!(
                "{operation}: ack={} data={}",
                ack.ack,
                data_text(&ack.data)
            );
        }
        OutputFormat::Raw => print_raw(data_text(&ack.data).as_bytes()),
    }
}

pub fn print_bytes(operation: &str, payload: &Payload, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&BytesOutput {
            operation,
            size: payload.len(),
            hex: hex(payload.as_bytes()),
            base64: payload.to_base64(),
        }),
        OutputFormat::Table => print_table(
            &["OPERATION", "SIZE", "HEX"],
            vec![
                operation.to_string(),
                payload.len().to_string(),
                hex(payload.as_bytes()),
            ],
        ),
        OutputFormat::Pretty => {
            println!(
                "{operation}: {} bytes [{}]",
                payload.len(),
                spaced_hex(payload.as_bytes())
            );
        }
        OutputFormat::Raw => print_raw(payload.as_bytes()),
    }
}

pub fn print_count(operation: &str, written: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&CountOutput { operation, written }),
        OutputFormat::Table => print_table(
            &["OPERATION", "WRITTEN"],
            vec![operation.to_string(), written.to_string()],
        ),
        OutputFormat::Pretty => println!("{operation}: wrote {written} bytes"),
        OutputFormat::Raw => println!("{written}"),
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(header: &[&str], row: Vec<String>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec())
        .add_row(row);
    println!("{table}");
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn data_text(data: &Value) -> String {
    match data {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn spaced_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex(&[0x00, 0x0f, 0xab]), "000fab");
        assert_eq!(spaced_hex(&[0x01, 0xff]), "01 ff");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn data_text_unquotes_strings() {
        assert_eq!(data_text(&Value::String("busy".into())), "busy");
        assert_eq!(data_text(&Value::from(4)), "4");
    }
}
