mod window;

use {
    base::Vec2,
    cartoon::{AppConfig, IntervalPacer, Pacer, Scheduler, StartupError, Telemetry, startup},
    std::env,
    window::WindowSurface,
};

fn load_config() -> Result<AppConfig, StartupError> {
    let config = match env::var("CARTOON_CONFIG") {
        Ok(path) => AppConfig::load(path)?,
        Err(_) => AppConfig::default(),
    };
    config.with_overrides(|name| env::var(name).ok())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config() {
        Ok(config) => config,
        Err(error) => {
            base::init_stdout_logger();
            base::log_fatal!("{}", error);
        }
    };

    match &config.log_dir {
        Some(dir) => base::init_file_logger(dir)?,
        None => base::init_stdout_logger(),
    }
    base::init_log_bridge();

    let telemetry = Telemetry::global();
    let pipeline = match startup::prepare_pipeline(&config, &telemetry) {
        Ok(pipeline) => pipeline,
        Err(error) => base::log_fatal!("{}", error),
    };
    let camera = match startup::start_camera(&config.capture).await {
        Ok(camera) => camera,
        Err(error) => base::log_fatal!("{}", error),
    };
    let input_size = config.model.input_size;
    let surface = match WindowSurface::new(
        "cartoon-cam - click or space to pause, ESC to exit",
        Vec2::new(input_size.width, input_size.height),
    ) {
        Ok(surface) => surface,
        Err(error) => base::log_fatal!("cannot open window: {}", error),
    };

    let mut scheduler =
        Scheduler::new(pipeline, camera, surface).with_error_policy(config.error_policy);
    let control = scheduler.control();
    let mut pacer = IntervalPacer::from_rate(config.refresh_rate);

    scheduler.start();
    while scheduler.surface().is_open() {
        pacer.next_tick().await;
        if scheduler.surface_mut().toggle_requested() {
            control.toggle();
        }
        match scheduler.advance().await {
            Ok(true) => {}
            Ok(false) => {
                base::log_warn!("camera closed");
                break;
            }
            Err(error) => {
                base::log_error!("{}", error);
                scheduler.finish();
                return Err(error.into());
            }
        }
        scheduler.surface_mut().pump()?;
    }
    scheduler.finish();
    Ok(())
}
