use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    diffusiondb::example_apps::run_list_configs(std::env::args().skip(1))
}
