//! Ad-hoc resource calls with the stored session.

use school_core::{Method, Payload};

use crate::cli::{GlobalOpts, HttpMethod, RequestArgs};
use crate::commands::util::{read_json_file, resume_credential};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

fn build_payload(args: &RequestArgs) -> Result<Payload, CliError> {
    if let Some(ref raw) = args.data {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        return Ok(Payload::Json(value));
    }
    if let Some(ref path) = args.data_file {
        return Ok(Payload::Json(read_json_file(path)?));
    }
    if let Some(ref path) = args.file {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".into(), |n| n.to_string_lossy().into_owned());
        return Ok(Payload::file(&args.field, file_name, bytes));
    }
    Ok(Payload::Empty)
}

pub async fn handle(resolved: &Resolved, args: RequestArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let payload = build_payload(&args)?;
    let controller = resolved.controller()?;
    resume_credential(&controller)?;

    tracing::debug!(method = ?args.method, resource = %args.resource, "request");
    let body = controller
        .call(&args.resource, args.method.into(), payload)
        .await?;

    let out = output::render_single(
        &global.output,
        &body,
        output::render_json_pretty,
        |v| match v {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(data: Option<&str>) -> RequestArgs {
        RequestArgs {
            method: HttpMethod::Post,
            resource: "students".into(),
            data: data.map(Into::into),
            data_file: None,
            file: None,
            field: "file".into(),
        }
    }

    #[test]
    fn inline_json_body() {
        let payload = build_payload(&args(Some(r#"{"name":"Asha"}"#))).unwrap();
        match payload {
            Payload::Json(v) => assert_eq!(v["name"], "Asha"),
            _ => panic!("expected JSON payload"),
        }
    }

    #[test]
    fn invalid_inline_json_is_rejected() {
        assert!(matches!(
            build_payload(&args(Some("{nope"))),
            Err(CliError::Json(_))
        ));
    }

    #[test]
    fn file_upload_becomes_multipart() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello").unwrap();

        let mut a = args(None);
        a.file = Some(tmp.path().to_path_buf());
        assert!(matches!(build_payload(&a), Ok(Payload::Multipart(_))));
    }

    #[test]
    fn no_body_is_empty() {
        assert!(matches!(build_payload(&args(None)), Ok(Payload::Empty)));
    }
}
