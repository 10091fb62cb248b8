//! Facts about the instance this client runs on.

use tracing::{debug, warn};

use crate::process::{Invocation, OutputStream, ProcessRunner};

/// Host information tool installed on Atmosphere instances.
pub const ATMOINFO: &str = "/usr/local/bin/atmoinfo";

/// Extract the instance id from `atmoinfo` output.
///
/// Takes the first line mentioning `instance-id` and returns the text from
/// its last `i` onward, e.g. `i-4E8B08A7` from `instance-id: i-4E8B08A7`.
pub fn parse_instance_id<'a, I>(lines: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let line = lines.into_iter().find(|line| line.contains("instance-id"))?;
    let start = line.rfind('i')?;
    let id = line[start..].trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Ask the host information tool which instance this is.
pub async fn resolve_instance_id<R>(runner: &R) -> Option<String>
where
    R: ProcessRunner + ?Sized,
{
    let mut lines = match runner
        .stream(&Invocation::new(ATMOINFO), OutputStream::Stdout)
        .await
    {
        Ok(lines) => lines,
        Err(e) => {
            warn!(error = %e, "Could not run the host information tool");
            return None;
        }
    };

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(id) = parse_instance_id([line.as_str()]) {
                    debug!(instance_id = %id, "Resolved current instance");
                    return Some(id);
                }
            }
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Reading host information failed");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::mock::ScriptedRunner;
    use crate::process::CommandOutput;

    #[test]
    fn parses_instance_line() {
        let output = "hostname: vm-12\ninstance-id: i-4E8B08A7\nzone: a";
        assert_eq!(
            parse_instance_id(output.lines()).as_deref(),
            Some("i-4E8B08A7")
        );
    }

    #[test]
    fn missing_line_is_none() {
        assert!(parse_instance_id("hostname: vm-12\n".lines()).is_none());
    }

    #[tokio::test]
    async fn resolves_through_runner() {
        let runner = ScriptedRunner::new().on(
            ATMOINFO,
            CommandOutput::with_stdout("ami-id: emi-1\ninstance-id: i-0000002A\n"),
        );
        assert_eq!(
            resolve_instance_id(&runner).await.as_deref(),
            Some("i-0000002A")
        );
    }

    #[tokio::test]
    async fn tool_missing_is_none() {
        let runner = ScriptedRunner::new().on_spawn_error(ATMOINFO);
        assert!(resolve_instance_id(&runner).await.is_none());
    }
}
