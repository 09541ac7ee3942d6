//! `gocy check-capacity`: ask the provider whether the constellation fits.

use clap::Args;

use gocy_common::Constellation;
use gocy_metal::{capacity, CapacityServer, MetalApi};

use crate::{Error, GlobalArgs, Result};

/// Check device capacity for every (metro, plan) the constellation needs
#[derive(Args, Debug)]
pub struct CheckCapacityArgs {}

/// Run the check-capacity command.
pub async fn run(global: &GlobalArgs, _args: CheckCapacityArgs) -> Result<()> {
    let (_, constellation) = global.load()?;
    let client = global.metal_client()?;

    let answer = check_capacity(&client, &constellation).await?;
    print_report(&answer);
    ensure_available(&answer)
}

/// Query the provider for every planned line
pub async fn check_capacity<A: MetalApi + ?Sized>(
    api: &A,
    constellation: &Constellation,
) -> Result<Vec<CapacityServer>> {
    Ok(capacity::check(api, constellation).await?)
}

/// Fail when any line is not available
pub fn ensure_available(answer: &[CapacityServer]) -> Result<()> {
    let missing = capacity::unavailable(answer);
    if missing.is_empty() {
        return Ok(());
    }
    let lines: Vec<String> = missing
        .iter()
        .map(|l| format!("{} x {} in {}", l.quantity, l.plan, l.metro))
        .collect();
    Err(Error::command_failed(format!(
        "insufficient capacity: {}",
        lines.join(", ")
    )))
}

fn print_report(answer: &[CapacityServer]) {
    println!("{:<8} {:<20} {:>8}  AVAILABLE", "METRO", "PLAN", "QUANTITY");
    for line in answer {
        let available = match line.available {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unknown",
        };
        println!(
            "{:<8} {:<20} {:>8}  {}",
            line.metro, line.plan, line.quantity, available
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{self, MockMetal};

    #[tokio::test]
    async fn unavailable_capacity_fails_the_run() {
        let (_dir, workspace) = test_support::workspace();
        let constellation = workspace.load_constellation().unwrap();

        let mut api = MockMetal::new();
        api.expect_check_capacity()
            .withf(|servers| {
                servers.len() == 2
                    && servers[0].metro == "am"
                    && servers[0].quantity == "2"
                    && servers[1].metro == "fr"
                    && servers[1].quantity == "3"
            })
            .returning(|servers| {
                Ok(servers
                    .iter()
                    .cloned()
                    .map(|mut s| {
                        s.available = Some(s.metro == "fr");
                        s
                    })
                    .collect())
            });

        let answer = check_capacity(&api, &constellation).await.unwrap();
        let err = ensure_available(&answer).unwrap_err();
        assert_eq!(
            err.to_string(),
            "command failed: insufficient capacity: 2 x c3.small.x86 in am"
        );
    }

    #[test]
    fn full_availability_passes() {
        let answer = vec![CapacityServer {
            metro: "fr".into(),
            plan: "c3.small.x86".into(),
            quantity: "3".into(),
            available: Some(true),
        }];
        ensure_available(&answer).unwrap();
    }
}
