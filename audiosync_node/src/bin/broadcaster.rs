fn main() -> anyhow::Result<core::convert::Infallible> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = audiosync_node::config_from_args(std::env::args_os())?;

    log::info!(
        "broadcasting to {}:{} every {:?}",
        config.group,
        config.port,
        audiosync_node::SEND_PERIOD
    );

    audiosync_node::broadcast(config)
}
