//! Quick Start Example
//!
//! Registers a company on a running Tycoon node, buys from the catalog and
//! prints the notifications that follow.

use tycoon_sdk::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Connect to a Tycoon node as participant 1
    let node = TycoonClient::connect("http://localhost:3000").await?;
    let me = node.as_user(UserId(1));

    let mut feed = me.notifications().await?;

    // 1. Claim the first free company
    let free = me.unclaimed_businesses().await?;
    let Some(business) = free.first() else {
        println!("No free companies on this node");
        return Ok(());
    };
    let business = me.complete_registration(business.id, "Quickstart Ltd").await?;
    println!("{}", business.overview());

    // 2. Fill the cart from the first subcategory and pay
    if let Some(category) = me.categories().await?.first() {
        if let Some(sub) = me.subcategories(category.id).await?.first() {
            for item in me.items(sub.id).await?.iter().take(2) {
                me.add_to_cart(item.id, 1).await?;
            }
        }
    }
    let cart = me.view_cart().await?;
    println!("{}", cart.render());
    if !cart.is_empty() {
        match me.checkout().await {
            Ok(receipt) => println!("Paid {}. Budget left: {}", cart.total, receipt.business.budget),
            Err(e) => println!("Checkout failed: {}", e),
        }
    }

    // 3. Print what the node told us
    while let Some(event) = feed.next().await {
        match event {
            NotificationEvent::Notification(n) => println!("> {}", n.text),
            NotificationEvent::Lagged { skipped } => println!("(missed {} notifications)", skipped),
        }
    }

    Ok(())
}
