fn main() {
    propulsion_pipeline::cli::run();
}
