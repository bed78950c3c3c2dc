use log::error;

fn main() {
    env_logger::init();

    if let Err(e) = sea_track::get_arg().and_then(sea_track::run) {
        error!("{e:#}");
        std::process::exit(-1);
    }
}
