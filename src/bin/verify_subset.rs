use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    subsets::apps::run_verify_subset(std::env::args().skip(1))
}
