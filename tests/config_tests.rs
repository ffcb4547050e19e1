//! Configuration file handling through the public API.

use serial_link::config::{ConfigError, ConfigLoader, LogFormat};
use serial_link::{Handshake, Newline, Parity, StopBits, TextEncoding};
use serial_test::serial;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
fn full_link_section() {
    let file = write_config(
        r#"
        [link]
        port_name = "/dev/ttyUSB1"
        baud_rate = 38400
        parity = "even"
        data_bits = 7
        stop_bits = "two"
        encoding = "latin1"
        newline = "cr"
        handshake = "rts"
        dtr_enable = true
        rts_enable = true
        read_timeout_ms = 10
        write_timeout_ms = 200
        auto_open = false

        [logging]
        level = "serial_link=trace"
        format = "pretty"
        "#,
    );

    let loader = ConfigLoader::load_from(file.path()).unwrap();
    let config = loader.config();
    let link = config.link().unwrap();

    assert_eq!(link.baud_rate, 38400);
    assert_eq!(link.parity, Parity::Even);
    assert_eq!(link.data_bits, 7);
    assert_eq!(link.stop_bits, StopBits::Two);
    assert_eq!(link.encoding, TextEncoding::Latin1);
    assert_eq!(link.newline, Newline::Cr);
    assert_eq!(link.handshake, Handshake::Rts);
    assert!(link.dtr_enable && link.rts_enable);
    assert_eq!(link.write_timeout_ms, 200);
    assert!(!link.auto_open);
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
#[serial]
fn invalid_data_bits_rejected() {
    let file = write_config(
        r#"
        [link]
        port_name = "COM2"
        baud_rate = 9600
        data_bits = 4
        "#,
    );

    let err = ConfigLoader::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));
}

#[test]
#[serial]
fn unknown_enum_value_is_parse_error() {
    let file = write_config(
        r#"
        [link]
        port_name = "COM2"
        baud_rate = 9600
        newline = "nel"
        "#,
    );

    let err = ConfigLoader::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}
