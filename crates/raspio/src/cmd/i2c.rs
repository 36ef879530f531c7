use std::time::Duration;

use raspio_device::{I2c, I2cDevice};

use crate::cmd::{I2cCommand, I2cTarget};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_bytes, print_count, OutputFormat};

pub fn run(command: I2cCommand, format: OutputFormat) -> CliResult<i32> {
    match command {
        I2cCommand::Read(args) => {
            let i2c = open(&args.target)?;
            let result = if args.target.ioctl {
                i2c.ioctl_read(args.reg, args.size)
            } else {
                i2c.read(args.reg, args.size)
            };
            let data = result.map_err(|err| device_error("i2c read failed", err))?;
            print_bytes("i2c.read", &data, format);
        }
        I2cCommand::Write(args) => {
            let i2c = open(&args.target)?;
            let result = if args.target.ioctl {
                i2c.ioctl_write(args.reg, &args.data.0)
            } else {
                i2c.write(args.reg, &args.data.0)
            };
            let written = result.map_err(|err| device_error("i2c write failed", err))?;
            print_count("i2c.write", written, format);
        }
    }
    Ok(SUCCESS)
}

fn open(target: &I2cTarget) -> CliResult<I2c> {
    let config = target.connect.session_config(Duration::from_secs(1))?;
    let device = I2cDevice::new(&target.bus, target.addr).with_tenbit(target.tenbit);
    I2c::open(&target.connect.resolver(), &target.connect.host, device, config)
        .map_err(|err| device_error("i2c open failed", err))
}
