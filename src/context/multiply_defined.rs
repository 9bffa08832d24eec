use std::net::SocketAddr;

/// Exception context for a name answered by more than one server.
pub(super) fn double_channel_report(
    name: &str,
    accepted: SocketAddr,
    rejected: &[SocketAddr],
) -> String {
    let ignored: Vec<String> = rejected.iter().map(ToString::to_string).collect();
    format!(
        "Channel: \"{name}\", Connecting to: {accepted}, Ignored: {}",
        ignored.join(", ")
    )
}
