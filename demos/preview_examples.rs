use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    diffusiondb::example_apps::run_preview(std::env::args().skip(1))
}
