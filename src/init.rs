//! The `init` command: interactive wizard that writes config.toml.

use std::path::Path;

use disparo_core::shellexpand;

const DEFAULT_DATA_DIR: &str = "~/.disparo";
const CONFIG_PATH: &str = "config.toml";

enum IntervalChoice {
    Fixed(u64),
    Random { min: u64, max: u64 },
}

pub async fn run() -> anyhow::Result<()> {
    cliclack::intro(console::style("disparo init").bold().to_string())?;

    let data_dir = shellexpand(DEFAULT_DATA_DIR);
    if Path::new(&data_dir).exists() {
        cliclack::log::success(format!("{data_dir} — exists"))?;
    } else {
        std::fs::create_dir_all(&data_dir)?;
        cliclack::log::success(format!("{data_dir} — created"))?;
    }

    let base_url: String = cliclack::input("WAHA base URL")
        .placeholder("http://localhost:3000")
        .default_input("http://localhost:3000")
        .interact()?;
    let api_key: String = cliclack::input("WAHA API key (X-Api-Key)")
        .placeholder("from your WAHA instance")
        .interact()?;
    let session: String = cliclack::input("WAHA session name")
        .default_input("default")
        .interact()?;

    let pacing = cliclack::select("Interval between messages")
        .item("fixed", "Fixed", "same wait before every record")
        .item(
            "random",
            "Random",
            "uniform draw from a range, redrawn each time",
        )
        .interact()?;
    let interval = if pacing == "random" {
        let min: String = cliclack::input("Minimum seconds")
            .default_input("30")
            .interact()?;
        let max: String = cliclack::input("Maximum seconds")
            .default_input("90")
            .interact()?;
        IntervalChoice::Random {
            min: min.trim().parse().unwrap_or(30),
            max: max.trim().parse().unwrap_or(90),
        }
    } else {
        let seconds: String = cliclack::input("Seconds between records")
            .default_input("60")
            .interact()?;
        IntervalChoice::Fixed(seconds.trim().parse().unwrap_or(60))
    };

    let country_code: String = cliclack::input("Country calling code")
        .default_input("55")
        .interact()?;
    let area_code: String = cliclack::input("Auto-fill area code for short numbers")
        .placeholder("e.g. 11 — Enter to disable")
        .required(false)
        .interact()?;
    let nine_variant = cliclack::select("9-digit variant handling")
        .item("off", "Off", "dial numbers exactly as normalized")
        .item("expand", "Expand", "queue both variants as separate records")
        .item(
            "fallback",
            "Fallback",
            "dial the alternate on the second attempt",
        )
        .interact()?;

    let template: String = cliclack::input("Primary message template")
        .placeholder("Olá {nome}, tudo bem?")
        .default_input("Olá {nome}!")
        .interact()?;

    if Path::new(CONFIG_PATH).exists() {
        cliclack::log::warning(format!(
            "{CONFIG_PATH} already exists — leaving it untouched.\n\
             Delete it and run 'disparo init' again to regenerate."
        ))?;
    } else {
        let content = generate_config(
            &base_url,
            &api_key,
            &session,
            &interval,
            country_code.trim(),
            area_code.trim(),
            nine_variant,
            &template,
        );
        std::fs::write(CONFIG_PATH, content)?;
        cliclack::log::success(format!("Generated {CONFIG_PATH}"))?;
    }

    cliclack::note(
        "Next steps",
        "1. Review config.toml (message slots live under [sender.messages])\n\
         2. Import contacts:  disparo import contacts.json --name \"my leads\"\n\
         3. Send:             disparo run --batch <id>",
    )?;
    cliclack::outro("Setup complete")?;
    Ok(())
}

/// Render the config file. Pure so tests can cover it without a terminal.
#[allow(clippy::too_many_arguments)]
fn generate_config(
    base_url: &str,
    api_key: &str,
    session: &str,
    interval: &IntervalChoice,
    country_code: &str,
    area_code: &str,
    nine_variant: &str,
    template: &str,
) -> String {
    let interval_section = match interval {
        IntervalChoice::Fixed(seconds) => {
            format!("[sender.interval]\nkind = \"fixed\"\nseconds = {seconds}")
        }
        IntervalChoice::Random { min, max } => {
            format!("[sender.interval]\nkind = \"random\"\nmin = {min}\nmax = {max}")
        }
    };
    let area_line = if area_code.is_empty() {
        "# auto_fill_area_code = \"11\"".to_string()
    } else {
        format!("auto_fill_area_code = \"{area_code}\"")
    };

    format!(
        r#"[app]
data_dir = "{DEFAULT_DATA_DIR}"
log_level = "info"

[gateway]
base_url = "{base_url}"
api_key = "{api_key}"
session = "{session}"
timeout_secs = 30

[store]
db_path = "{DEFAULT_DATA_DIR}/data/disparo.db"

[sender]
max_attempts = 3
retry_base_ms = 1500
remove_duplicates = true
nine_variant = "{nine_variant}"

{interval_section}

[sender.phone]
country_code = "{country_code}"
{area_line}

[sender.messages]
text_1 = "{template}"
# text_2 = ""
# text_3 = ""
# file_link = "https://example.com/catalog.pdf"
# image_link = "https://example.com/banner.png"
"#
    )
}
