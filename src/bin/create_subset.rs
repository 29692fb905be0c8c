use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    subsets::apps::run_create_subset(std::env::args().skip(1))
}
