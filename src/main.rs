//! Main entry point for the gateway executable.

fn main() -> anyhow::Result<()> {
    bistro_gateway::main()
}
