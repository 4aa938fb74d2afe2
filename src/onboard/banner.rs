pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    match tui_banner::Banner::new("OSA")
        .map(|b| b.style(tui_banner::Style::NeonCyber).render())
    {
        Ok(banner) => {
            println!("{banner}");
            println!("             Osa v{version}");
            println!("        Blazingly fast AI agent runtime\n");
        }
        Err(_) => {
            println!("\n  OSA v{version}\n  Blazingly fast AI agent runtime\n");
        }
    }
}
