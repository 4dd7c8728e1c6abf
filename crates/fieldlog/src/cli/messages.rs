//! Messages command - Paginated device history, newest first

use crate::cli::error::HelpfulError;
use crate::cli::output::{class_color, ellipsize, print_table_colored};
use anyhow::Result;
use fieldlog::report::MESSAGE_TEXT_LIMIT;
use fieldlog::AppConfig;
use fieldlog_db::MessagePage;

#[derive(Debug)]
pub struct MessagesArgs {
    pub unit_guid: String,
    pub page: u32,
    pub limit: u32,
    pub json: bool,
}

pub fn run(args: MessagesArgs, config: &AppConfig) -> Result<()> {
    let rt = super::current_thread_runtime()?;
    rt.block_on(run_async(args, config))
}

async fn run_async(args: MessagesArgs, config: &AppConfig) -> Result<()> {
    let db = super::open_existing_db(config).await?;
    let page = db
        .messages_by_device_page(&args.unit_guid, args.page, args.limit)
        .await?;
    db.close().await;
    ensure_not_empty(&page)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    println!(
        "Device {}: {} messages (page {} of {}, {} per page)",
        page.unit_guid,
        page.total,
        page.page,
        page.pages(),
        page.limit
    );
    println!();

    let offset = (page.page as usize - 1) * page.limit as usize;
    let rows = page
        .messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            vec![
                ((offset + i + 1).to_string(), None),
                (m.number.to_string(), None),
                (m.invid.clone(), None),
                (ellipsize(&m.message_text, MESSAGE_TEXT_LIMIT * 2), None),
                (m.message_class.to_string(), class_color(&m.message_class)),
                (m.level.to_string(), None),
                (m.area.clone(), None),
                (m.address.clone(), None),
            ]
        })
        .collect();
    print_table_colored(
        &["#", "No.", "Inventory", "Message", "Class", "Level", "Area", "Address"],
        rows,
    );

    Ok(())
}

fn ensure_not_empty(page: &MessagePage) -> Result<(), HelpfulError> {
    if page.messages.is_empty() {
        return Err(HelpfulError::no_messages(&page.unit_guid, page.page, page.total));
    }
    Ok(())
}
