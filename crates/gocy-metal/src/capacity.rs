//! Device capacity planning

use std::collections::BTreeMap;

use tracing::{info, warn};

use gocy_common::{Constellation, Result};

use crate::client::MetalApi;
use crate::types::CapacityServer;

/// Devices a constellation needs, summed per (metro, plan) across every cluster
pub fn plan(constellation: &Constellation) -> Vec<CapacityServer> {
    let mut totals: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for cluster in constellation.clusters() {
        for node in cluster.node_plans() {
            *totals
                .entry((cluster.metro.as_str(), node.plan.as_str()))
                .or_default() += node.count;
        }
    }

    totals
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|((metro, plan), count)| CapacityServer {
            metro: metro.to_string(),
            plan: plan.to_string(),
            quantity: count.to_string(),
            available: None,
        })
        .collect()
}

/// Ask the provider whether every planned line can be provisioned.
///
/// Returns the provider's answer; lines it reports as unavailable are logged.
pub async fn check<A: MetalApi + ?Sized>(
    api: &A,
    constellation: &Constellation,
) -> Result<Vec<CapacityServer>> {
    let wanted = plan(constellation);
    if wanted.is_empty() {
        info!("Constellation declares no machines; nothing to check");
        return Ok(wanted);
    }

    let answer = api.check_capacity(&wanted).await?;
    for line in &answer {
        if line.available == Some(true) {
            info!(metro = %line.metro, plan = %line.plan, quantity = %line.quantity, "Capacity available");
        } else {
            warn!(metro = %line.metro, plan = %line.plan, quantity = %line.quantity, "Capacity unavailable");
        }
    }
    Ok(answer)
}

/// Lines the provider did not confirm as available
pub fn unavailable(answer: &[CapacityServer]) -> Vec<&CapacityServer> {
    answer
        .iter()
        .filter(|line| line.available != Some(true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockMetalApi;

    const CONSTELLATION: &str = r#"
name: jupiter
bary:
  name: jupiter
  metro: fr
  control_nodes:
    - plan: c3.small.x86
      count: 3
  worker_nodes:
    - plan: c3.small.x86
      count: 2
    - plan: m3.large.x86
      count: 1
satellites:
  - name: io
    metro: am
    control_nodes:
      - plan: c3.small.x86
        count: 1
  - name: europa
    metro: fr
    worker_nodes:
      - plan: m3.large.x86
        count: 2
"#;

    fn line(metro: &str, plan: &str, quantity: &str) -> CapacityServer {
        CapacityServer {
            metro: metro.into(),
            plan: plan.into(),
            quantity: quantity.into(),
            available: None,
        }
    }

    #[test]
    fn plans_are_summed_per_metro() {
        let constellation = Constellation::from_yaml(CONSTELLATION).unwrap();
        assert_eq!(
            plan(&constellation),
            vec![
                line("am", "c3.small.x86", "1"),
                line("fr", "c3.small.x86", "5"),
                line("fr", "m3.large.x86", "3"),
            ]
        );
    }

    #[tokio::test]
    async fn unavailable_lines_are_reported() {
        let constellation = Constellation::from_yaml(CONSTELLATION).unwrap();

        let mut api = MockMetalApi::new();
        api.expect_check_capacity()
            .withf(|servers| servers.len() == 3)
            .times(1)
            .returning(|servers| {
                Ok(servers
                    .iter()
                    .cloned()
                    .map(|mut s| {
                        s.available = Some(s.metro != "am");
                        s
                    })
                    .collect())
            });

        let answer = check(&api, &constellation).await.unwrap();
        let missing = unavailable(&answer);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].metro, "am");
    }

    #[tokio::test]
    async fn empty_plan_skips_the_provider() {
        let constellation = Constellation::from_yaml(
            "bary:\n  name: jupiter\n  metro: fr\n",
        )
        .unwrap();

        let mut api = MockMetalApi::new();
        api.expect_check_capacity().never();
        assert!(check(&api, &constellation).await.unwrap().is_empty());
    }
}
