use std::process;

use proxyprobe_rs::{
    AppSettings, CredentialResolver, ProbeRunner, PropertiesFile, VERSION, config_path_from_args,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    log::info!("proxyprobe {VERSION}");

    let config_path = config_path_from_args(&args);
    let properties = match PropertiesFile::load(&config_path) {
        Ok(properties) => properties,
        Err(err) => {
            log::error!("{err}; continuing with command line values only");
            PropertiesFile::default()
        }
    };

    let resolver = CredentialResolver::new();
    let base = resolver.base_from_properties(&properties);
    let proxy = resolver.resolve(&base, &args);
    let settings = AppSettings::resolve(&properties, &args);
    let strict = settings.strict_exit;

    let code = match ProbeRunner::new(settings, proxy).run() {
        Ok(report) => report.exit_code(strict),
        Err(err) => {
            log::error!("{err}");
            if strict { 1 } else { 0 }
        }
    };
    process::exit(code);
}
