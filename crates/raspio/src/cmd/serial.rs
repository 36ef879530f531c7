use raspio_device::{Serial, SerialConfig};

use crate::cmd::{parse_duration, SerialCommand, SerialTarget};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_bytes, print_count, OutputFormat};

pub fn run(command: SerialCommand, format: OutputFormat) -> CliResult<i32> {
    match command {
        SerialCommand::Read(args) => {
            let serial = open(&args.target)?;
            let data = serial
                .read(args.size)
                .map_err(|err| device_error("serial read failed", err))?;
            print_bytes("serial.read", &data, format);
        }
        SerialCommand::Write(args) => {
            let serial = open(&args.target)?;
            let data = match (args.data, args.text) {
                (Some(hex), _) => hex.0,
                (None, Some(text)) => text.into_bytes(),
                (None, None) => Vec::new(),
            };
            let written = serial
                .write(&data)
                .map_err(|err| device_error("serial write failed", err))?;
            print_count("serial.write", written, format);
        }
    }
    Ok(SUCCESS)
}

fn open(target: &SerialTarget) -> CliResult<Serial> {
    let port = SerialConfig::new(target.baudrate).with_timeout(parse_duration(&target.read_timeout)?);
    let config = target
        .connect
        .session_config(port.session_config().timeout)?;
    Serial::open_with(
        &target.connect.resolver(),
        &target.connect.host,
        target.device.as_str(),
        port,
        config,
    )
    .map_err(|err| device_error("serial open failed", err))
}
