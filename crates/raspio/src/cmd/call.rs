use std::time::Duration;

use raspio_codec::{RawRequest, Request};
use raspio_session::Session;
use raspio_transport::ResourceTarget;
use tracing::info;

use crate::cmd::CallArgs;
use crate::exit::{call_error, open_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_ack, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let open = parse_request("--open", &args.open)?;
    let close = parse_request("--close", &args.close)?;
    let requests = args
        .requests
        .iter()
        .map(|text| parse_request("--request", text))
        .collect::<CliResult<Vec<_>>>()?;

    let config = args.connect.session_config(Duration::from_secs(1))?;
    let target = ResourceTarget::new(&args.connect.host, &args.path, &args.resource);
    let session = Session::open(&args.connect.resolver(), &target, &open, &close, config)
        .map_err(|err| open_error("open failed", err))?;
    info!(endpoint = %session.endpoint(), requests = requests.len(), "session ready");

    let mut all_acked = true;
    for request in &requests {
        let handle = request.handle().to_string();
        let ack = session
            .call(request)
            .map_err(|err| call_error(&format!("{handle} failed"), err))?;
        all_acked &= ack.ack;
        print_ack(&handle, &ack, format);
    }
    session.close();

    Ok(if all_acked { SUCCESS } else { FAILURE })
}

fn parse_request(flag: &str, text: &str) -> CliResult<RawRequest> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|err| CliError::new(USAGE, format!("{flag} is not valid JSON: {err}")))?;
    RawRequest::from_value(value)
        .map_err(|_| {
            CliError::new(
                USAGE,
                format!("{flag} must be a JSON object with a string \"handle\""),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_need_a_handle() {
        let request = parse_request("--request", r#"{"handle":"read","size":4}"#).unwrap();
        assert_eq!(request.handle(), "read");

        let err = parse_request("--request", r#"{"size":4}"#).unwrap_err();
        assert_eq!(err.code, USAGE);
        let err = parse_request("--open", "not-json").unwrap_err();
        assert!(err.message.starts_with("--open"));
    }
}
