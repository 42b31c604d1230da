use anyhow::Result;

fn main() -> Result<()> {
    atlas_cli::main_entry()
}
