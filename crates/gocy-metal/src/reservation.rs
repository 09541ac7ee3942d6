//! VIP reservation engine
//!
//! For every (cluster, VIP) pair, in declaration order:
//!
//! 1. A committed reservation record wins; no provider call is made.
//! 2. Otherwise the project inventory (fetched at most once per run) is matched
//!    against the VIP's tags.
//! 3. Global VIPs go through a run-scoped singleton: the first cluster that needs
//!    one adopts the inventory match or issues the only request of the run, every
//!    later cluster reuses it.
//! 4. Public VIPs with no match are requested for the cluster's metro.
//! 5. The outcome is expanded into the per-role address file.
//!
//! Records are written only after the provider answered successfully and the
//! answer expanded cleanly.

use tracing::{debug, info};

use gocy_common::{Cluster, Constellation, Error, Result, VipRole, VipSpec, VipType};

use crate::addresses::ReservedVips;
use crate::client::MetalApi;
use crate::matcher;
use crate::store::RecordStore;
use crate::types::{IpRequest, IpReservation};

/// Where a reconciled reservation came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// A committed reservation record
    Record,
    /// An existing entry of the provider inventory
    Inventory,
    /// A reservation requested during this run
    Requested,
    /// The run's global VIP, reserved or adopted for an earlier cluster
    SharedGlobal,
}

impl Source {
    fn commits_record(self) -> bool {
        matches!(self, Self::Requested | Self::SharedGlobal)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record => write!(f, "record"),
            Self::Inventory => write!(f, "inventory"),
            Self::Requested => write!(f, "requested"),
            Self::SharedGlobal => write!(f, "shared-global"),
        }
    }
}

/// Result of reconciling one (cluster, VIP) pair
#[derive(Clone, Debug, PartialEq)]
pub struct VipOutcome {
    /// Cluster name
    pub cluster: String,
    /// VIP role
    pub role: VipRole,
    /// VIP type
    pub vip_type: VipType,
    /// How the reservation was obtained
    pub source: Source,
    /// Provider documents backing the VIP
    pub reservations: Vec<IpReservation>,
    /// Expanded addresses
    pub addresses: ReservedVips,
}

/// State shared by every step of one reconciliation run
#[derive(Debug, Default)]
pub struct ReconcileContext {
    inventory: Option<Vec<IpReservation>>,
    global_vip: Option<Vec<IpReservation>>,
    global_requested: bool,
    requests: usize,
}

impl ReconcileContext {
    /// Fresh context; the inventory is fetched on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with an already fetched inventory snapshot
    pub fn with_inventory(inventory: Vec<IpReservation>) -> Self {
        Self {
            inventory: Some(inventory),
            ..Self::default()
        }
    }

    /// The run's global VIP, once known
    pub fn global_vip(&self) -> Option<&[IpReservation]> {
        self.global_vip.as_deref()
    }

    /// Reservation requests issued so far in this run
    pub fn requests_issued(&self) -> usize {
        self.requests
    }

    /// Claim the run's single global reservation request
    fn claim_global_request(&mut self) -> Result<()> {
        if self.global_requested || self.global_vip.is_some() {
            return Err(Error::constraint(
                "a global_ipv4 reservation was already made in this run; the provider allows one per project",
            ));
        }
        self.global_requested = true;
        Ok(())
    }
}

/// Reconciles declared VIPs against the provider
pub struct ReservationEngine<'a, A: MetalApi + ?Sized> {
    api: &'a A,
    store: RecordStore,
}

impl<'a, A: MetalApi + ?Sized> ReservationEngine<'a, A> {
    /// Engine using `api` for provider calls and `store` for records
    pub fn new(api: &'a A, store: RecordStore) -> Self {
        Self { api, store }
    }

    /// Reconcile every VIP of every cluster, bary first, in declaration order
    pub async fn reconcile_constellation(
        &self,
        ctx: &mut ReconcileContext,
        constellation: &Constellation,
    ) -> Result<Vec<VipOutcome>> {
        self.seed_global(ctx, constellation)?;

        let mut outcomes = Vec::new();
        for cluster in constellation.clusters() {
            for vip in &cluster.vips {
                outcomes.push(self.reconcile(ctx, cluster, vip).await?);
            }
        }
        Ok(outcomes)
    }

    /// Seed the run's global VIP from the first committed global record of any
    /// cluster, so a cluster earlier in declaration order never requests a second one.
    pub fn seed_global(
        &self,
        ctx: &mut ReconcileContext,
        constellation: &Constellation,
    ) -> Result<()> {
        if ctx.global_vip.is_some() {
            return Ok(());
        }
        for cluster in constellation.clusters() {
            for vip in cluster.vips.iter().filter(|v| v.vip_type.is_global()) {
                if let Some(record) = self.store.load_record(&cluster.name, vip.role)? {
                    debug!(cluster = %cluster.name, role = %vip.role, "Global VIP seeded from record");
                    ctx.global_vip = Some(record);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Reconcile one VIP of one cluster
    pub async fn reconcile(
        &self,
        ctx: &mut ReconcileContext,
        cluster: &Cluster,
        vip: &VipSpec,
    ) -> Result<VipOutcome> {
        let (reservations, source) = match self.store.load_record(&cluster.name, vip.role)? {
            Some(record) => {
                debug!(cluster = %cluster.name, role = %vip.role, "Reservation record present");
                if vip.vip_type.is_global() && ctx.global_vip.is_none() {
                    ctx.global_vip = Some(record.clone());
                }
                (record, Source::Record)
            }
            None => match vip.vip_type {
                VipType::GlobalIpv4 => self.reconcile_global(ctx, cluster, vip).await?,
                VipType::PublicIpv4 => self.reconcile_public(ctx, cluster, vip).await?,
            },
        };

        let addresses = ReservedVips::from_reservations(&reservations)?;
        if addresses.is_empty() {
            return Err(Error::inventory_mismatch(
                &cluster.name,
                vip.role,
                format!("{} reservation expands to no addresses", source),
            ));
        }

        if source.commits_record() {
            self.store
                .save_record(&cluster.name, vip.role, &reservations)?;
        }
        self.store
            .save_addresses(&cluster.name, vip.role, &addresses)?;

        info!(
            cluster = %cluster.name,
            role = %vip.role,
            vip_type = %vip.vip_type,
            source = %source,
            addresses = %addresses.all().collect::<Vec<_>>().join(","),
            "VIP reconciled"
        );

        Ok(VipOutcome {
            cluster: cluster.name.clone(),
            role: vip.role,
            vip_type: vip.vip_type,
            source,
            reservations,
            addresses,
        })
    }

    async fn inventory<'c>(&self, ctx: &'c mut ReconcileContext) -> Result<&'c [IpReservation]> {
        if ctx.inventory.is_none() {
            let fetched = self.api.list_ips().await?;
            ctx.inventory = Some(fetched);
        }
        Ok(ctx.inventory.as_deref().unwrap_or_default())
    }

    async fn reconcile_global(
        &self,
        ctx: &mut ReconcileContext,
        cluster: &Cluster,
        vip: &VipSpec,
    ) -> Result<(Vec<IpReservation>, Source)> {
        if let Some(shared) = &ctx.global_vip {
            debug!(cluster = %cluster.name, role = %vip.role, "Reusing the run's global VIP");
            return Ok((shared.clone(), Source::SharedGlobal));
        }

        let found: Vec<IpReservation> = matcher::find(self.inventory(ctx).await?, vip, cluster)
            .into_iter()
            .cloned()
            .collect();

        let (reservations, source) = match found.len() {
            0 => {
                ctx.claim_global_request()?;
                let request = IpRequest::global(vip.count, matcher::vip_tags(vip.role, cluster));
                (self.request(ctx, cluster, vip, &request).await?, Source::Requested)
            }
            1 => (found, Source::Inventory),
            n => {
                return Err(Error::inventory_mismatch(
                    &cluster.name,
                    vip.role,
                    format!(
                        "{} global_ipv4 reservations carry tags [{}]; at most one may exist per project",
                        n,
                        matcher::vip_tags(vip.role, cluster).join(", ")
                    ),
                ))
            }
        };

        ctx.global_vip = Some(reservations.clone());
        Ok((reservations, source))
    }

    async fn reconcile_public(
        &self,
        ctx: &mut ReconcileContext,
        cluster: &Cluster,
        vip: &VipSpec,
    ) -> Result<(Vec<IpReservation>, Source)> {
        if let Some(hit) = matcher::find_first(self.inventory(ctx).await?, vip, cluster) {
            return Ok((vec![hit.clone()], Source::Inventory));
        }

        let request = IpRequest::public(
            vip.count,
            &cluster.metro,
            matcher::vip_tags(vip.role, cluster),
        );
        let reservations = self.request(ctx, cluster, vip, &request).await?;
        Ok((reservations, Source::Requested))
    }

    async fn request(
        &self,
        ctx: &mut ReconcileContext,
        cluster: &Cluster,
        vip: &VipSpec,
        request: &IpRequest,
    ) -> Result<Vec<IpReservation>> {
        ctx.requests += 1;
        let reservations = self.api.request_ips(request).await?;
        if reservations.is_empty() {
            return Err(Error::provider(
                "ips",
                format!(
                    "reservation request for {}/{} returned no documents",
                    cluster.name, vip.role
                ),
            ));
        }
        Ok(reservations)
    }
}
