fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = audiosync_node::config_from_args(std::env::args_os())?;

    log::info!("listening on {}:{}", config.group, config.port);

    audiosync_node::listen(config)
}
