//! Integration tests for the client against an in-memory database.

use ovnnb_client::{
    AclSpec, ClientConfig, Command, Criteria, NbClient, NbError, NbEvent, NbResult, Transport,
    UpdateListener,
};
use ovnnb_protocol::{FieldValue, Operation, OperationResult, RefSet, Row, RowId, TableUpdates};
use ovnnb_testkit::{
    acl_row, ref_shape_strategy, seed_acl, seed_switch, Delivery, MemoryDatabase,
    MemoryDatabaseConfig,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// A transport that connects to an in-memory database.
///
/// Every message goes through its JSON encoding, as it would on a socket.
struct InMemoryTransport {
    db: Arc<MemoryDatabase>,
    connected: AtomicBool,
}

impl InMemoryTransport {
    fn new(db: Arc<MemoryDatabase>) -> Self {
        Self {
            db,
            connected: AtomicBool::new(true),
        }
    }
}

impl Transport for InMemoryTransport {
    fn monitor_all(&self, _database: &str) -> NbResult<TableUpdates> {
        Ok(TableUpdates::from_json(&self.db.monitor_all().to_json())?)
    }

    fn transact(&self, _database: &str, operations: &[Operation]) -> NbResult<Vec<OperationResult>> {
        if !self.is_connected() {
            return Err(NbError::transport_retryable("not connected"));
        }
        let decoded = operations
            .iter()
            .map(|op| Operation::from_json(&op.to_json()))
            .collect::<Result<Vec<_>, _>>()?;
        self.db
            .transact(&decoded)
            .iter()
            .map(|result| OperationResult::from_json(&result.to_json()).map_err(NbError::from))
            .collect()
    }

    fn register_listener(&self, listener: Arc<dyn UpdateListener>) -> NbResult<()> {
        self.db.subscribe(move |batch| {
            let decoded = TableUpdates::from_json(&batch.to_json()).expect("update decodes");
            listener.on_update(&decoded);
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> NbResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn open(db: &Arc<MemoryDatabase>) -> NbClient<InMemoryTransport> {
    init_tracing();
    NbClient::open(ClientConfig::default(), InMemoryTransport::new(Arc::clone(db))).unwrap()
}

fn pairs(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn run(client: &NbClient<InMemoryTransport>, command: NbResult<Command>) {
    client.execute([command.unwrap()]).unwrap();
}

#[test]
fn switch_lifecycle() {
    let db = Arc::new(MemoryDatabase::new());
    let client = open(&db);
    let switches = client.logical_switch();

    run(&client, switches.add("LS3"));
    let listed = switches.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "LS3");

    let ids = pairs(&[("neutron:network", "dummy"), ("foo", "bar")]);
    run(&client, switches.set_external_ids("LS3", &ids));
    assert_eq!(switches.get("LS3").unwrap().external_ids, ids);

    assert!(matches!(
        switches.set_external_ids("LS3", &BTreeMap::new()),
        Err(NbError::InvalidArgument(_))
    ));

    run(
        &client,
        switches.del_external_ids("LS3", &pairs(&[("neutron:network", "dummy")])),
    );
    assert_eq!(switches.get("LS3").unwrap().external_ids, pairs(&[("foo", "bar")]));

    run(&client, switches.del("LS3"));
    assert!(switches.list().unwrap().is_empty());
}

#[test]
fn adding_existing_switch_is_rejected() {
    let db = Arc::new(MemoryDatabase::new());
    let client = open(&db);
    run(&client, client.logical_switch().add("ls1"));

    let err = client.logical_switch().add("ls1").unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(db.transaction_count(), 1);
}

#[test]
fn port_add_and_delete_keep_switch_references() {
    let db = Arc::new(MemoryDatabase::new());
    seed_switch(&db, "ls1", &[]).unwrap();
    let client = open(&db);

    let replies = client
        .execute([client.logical_port().add("ls1", "p1").unwrap()])
        .unwrap();
    let port_id = replies[0].inserted().cloned().unwrap();

    let switch = client.logical_switch().get("ls1").unwrap();
    assert!(switch.ports.contains(&port_id));
    assert_eq!(
        client.cache().row_id_referencing("Logical_Switch", "ports", &port_id),
        Some(switch.uuid.clone())
    );

    run(&client, client.logical_port().del("p1"));
    let switch = client.logical_switch().get("ls1").unwrap();
    assert!(!switch.ports.contains(&port_id));
    assert!(client.logical_port().get("p1").unwrap_err().is_not_found());
    assert_eq!(db.row_count("Logical_Switch_Port"), 0);
}

#[test]
fn port_configuration() {
    let db = Arc::new(MemoryDatabase::new());
    seed_switch(&db, "ls1", &["p1"]).unwrap();
    let client = open(&db);
    let ports = client.logical_port();

    run(&client, ports.set_addresses("p1", &["00:00:00:00:00:aa 10.0.0.9"]));
    run(&client, ports.set_port_security("p1", &["00:00:00:00:00:aa"]));
    run(&client, ports.set_options("p1", &pairs(&[("requested-chassis", "hv1")])));
    run(
        &client,
        ports.set_dhcpv4_options(
            "p1",
            "10.0.0.0/24",
            &pairs(&[("router", "10.0.0.1"), ("lease_time", "3600")]),
            Some(&pairs(&[("owner", "test")])),
        ),
    );

    let port = ports.get("p1").unwrap();
    assert_eq!(port.addresses, vec!["00:00:00:00:00:aa 10.0.0.9".to_string()]);
    assert_eq!(port.port_security, vec!["00:00:00:00:00:aa".to_string()]);
    assert_eq!(port.options["requested-chassis"], "hv1");

    let dhcp_id = port.dhcpv4_options.unwrap();
    let dhcp = client.dhcp_options().get(&dhcp_id).unwrap();
    assert_eq!(dhcp.cidr, "10.0.0.0/24");
    assert_eq!(dhcp.options["lease_time"], "3600");
    assert_eq!(dhcp.external_ids["owner"], "test");

    run(&client, ports.set_addresses("p1", &[]));
    assert!(ports.get("p1").unwrap().addresses.is_empty());
    assert_eq!(ports.list_by_switch("ls1").unwrap().len(), 1);
}

#[test]
fn dhcp_options_are_replaced_not_stacked() {
    let db = Arc::new(MemoryDatabase::new());
    seed_switch(&db, "ls1", &["p1"]).unwrap();
    let client = open(&db);
    let ports = client.logical_port();

    run(&client, ports.set_dhcpv4_options("p1", "10.0.0.0/24", &pairs(&[("router", "10.0.0.1")]), None));
    let first = ports.get("p1").unwrap().dhcpv4_options.unwrap();
    run(&client, ports.set_dhcpv4_options("p1", "10.0.1.0/24", &pairs(&[("router", "10.0.1.1")]), None));

    let port = ports.get("p1").unwrap();
    let second = port.dhcpv4_options.unwrap();
    assert_ne!(first, second);
    assert_eq!(client.dhcp_options().get(&second).unwrap().cidr, "10.0.1.0/24");
    let listed = ports.list_by_switch("ls1").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].dhcpv4_options, Some(second));
}

#[test]
fn acl_lifecycle_and_priority_breadth() {
    let db = Arc::new(MemoryDatabase::new());
    seed_switch(&db, "ls1", &[]).unwrap();
    for priority in [100, 200, 300] {
        seed_acl(&db, "ls1", acl_row("to-lport", "ip4.src == 10.0.0.1", priority, "drop")).unwrap();
    }
    seed_acl(&db, "ls1", acl_row("from-lport", "ip4", 100, "allow")).unwrap();
    let client = open(&db);
    let acls = client.acl();

    let duplicate = AclSpec::new("to-lport", "ip4.src == 10.0.0.1", "allow", 200);
    assert!(acls.add("ls1", &duplicate).unwrap_err().is_already_exists());

    run(&client, acls.del("ls1", "to-lport", "ip4.src == 10.0.0.1", 200, None));
    assert_eq!(acls.list_by_switch("ls1").unwrap().len(), 3);

    run(&client, acls.del("ls1", "to-lport", "ip4.src == 10.0.0.1", -1, None));
    let left = acls.list_by_switch("ls1").unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].direction, "from-lport");
    assert_eq!(db.row_count("ACL"), 1);

    let err = acls
        .del("ls1", "to-lport", "ip4.src == 10.0.0.1", -1, None)
        .unwrap_err();
    assert!(err.is_not_found());

    let spec = AclSpec::new("to-lport", "tcp.dst == 22", "reject", 1000)
        .with_external_ids(pairs(&[("owner", "ssh")]))
        .with_log(true);
    run(&client, acls.add("ls1", &spec));
    let added = acls
        .list_by_switch("ls1")
        .unwrap()
        .into_iter()
        .find(|acl| acl.priority == 1000)
        .unwrap();
    assert!(added.log);
    assert_eq!(added.action, "reject");
}

#[test]
fn address_sets() {
    let db = Arc::new(MemoryDatabase::new());
    let client = open(&db);
    let sets = client.address_set();

    run(&client, sets.add("web", &["10.0.0.1", "10.0.0.2"], None));
    assert!(sets.add("web", &[], None).unwrap_err().is_already_exists());

    run(&client, sets.update("web", &["10.0.0.3"], Some(&pairs(&[("k", "v")]))));
    let web = sets.get("web").unwrap();
    assert_eq!(web.addresses, vec!["10.0.0.3".to_string()]);
    assert_eq!(web.external_ids["k"], "v");

    run(&client, sets.del("web"));
    assert!(sets.list().unwrap().is_empty());
}

#[test]
fn events_cover_ports_and_acls_only() {
    let db = Arc::new(MemoryDatabase::new());
    let client = open(&db);
    let events = client.subscribe();

    run(&client, client.logical_switch().add("ls1"));
    run(&client, client.address_set().add("as1", &["10.0.0.1"], None));
    assert!(events.try_recv().is_err());

    run(&client, client.logical_port().add("ls1", "p1"));
    run(
        &client,
        client.acl().add("ls1", &AclSpec::new("to-lport", "ip4", "allow", 10)),
    );
    assert!(matches!(events.try_recv(), Ok(NbEvent::PortCreated(p)) if p.name == "p1"));
    assert!(matches!(events.try_recv(), Ok(NbEvent::AclCreated(a)) if a.priority == 10));

    run(&client, client.logical_switch().del("ls1"));
    let mut deleted: Vec<NbEvent> = events.try_iter().collect();
    deleted.sort_by_key(|event| matches!(event, NbEvent::PortDeleted(_)));
    assert_eq!(deleted.len(), 2);
    assert!(matches!(&deleted[0], NbEvent::AclDeleted(_)));
    assert!(matches!(&deleted[1], NbEvent::PortDeleted(p) if p.name == "p1"));
}

#[test]
fn failed_transaction_reports_operation() {
    let db = Arc::new(MemoryDatabase::new());
    seed_switch(&db, "ls1", &[]).unwrap();
    let client = open(&db);

    db.fail_next("timed out", "server busy");
    let err = client
        .execute([client.logical_port().add("ls1", "p1").unwrap()])
        .unwrap_err();
    let NbError::TransactionFailed(failure) = &err else {
        panic!("unexpected error {err}");
    };
    let first = failure.first().unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(first.error, "timed out");
    assert_eq!(first.details.as_deref(), Some("server busy"));
    assert!(client.logical_port().get("p1").is_err());
}

#[test]
fn commit_failure_is_reported() {
    let db = Arc::new(MemoryDatabase::new());
    let client = open(&db);
    run(&client, client.address_set().add("web", &[], None));

    // A second client has not seen the first insert yet.
    let stale = Arc::new(MemoryDatabase::new());
    let stale_client = open(&stale);
    let command = stale_client.address_set().add("web", &[], None).unwrap();

    let err = client.execute([command]).unwrap_err();
    let NbError::TransactionFailed(failure) = err else {
        panic!("expected transaction failure");
    };
    assert_eq!(failure.failures[0].index, 1);
    assert_eq!(failure.failures[0].error, "constraint violation");
    assert!(failure.failures[0].op.is_none());
}

#[test]
fn short_reply_fails() {
    let db = Arc::new(MemoryDatabase::new());
    seed_switch(&db, "ls1", &[]).unwrap();
    let client = open(&db);

    db.truncate_next(1);
    let err = client
        .execute([client.logical_port().add("ls1", "p1").unwrap()])
        .unwrap_err();
    assert!(err.is_retryable());
    let NbError::TransactionFailed(failure) = err else {
        panic!("expected transaction failure");
    };
    assert!(failure.is_short_reply());
    assert_eq!((failure.expected, failure.received), (2, 1));
}

#[test]
fn commands_share_one_transaction() {
    let db = Arc::new(MemoryDatabase::new());
    seed_switch(&db, "ls1", &[]).unwrap();
    let client = open(&db);

    let replies = client
        .execute([
            client.logical_port().add("ls1", "p1").unwrap(),
            client.logical_port().add("ls1", "p2").unwrap(),
            client.logical_switch().add("ls2").unwrap(),
        ])
        .unwrap();
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0].results.len(), 2);
    assert_eq!(replies[2].results.len(), 1);
    assert_eq!(db.transaction_count(), 2);
    assert_eq!(client.logical_port().list_by_switch("ls1").unwrap().len(), 2);

    // One bad command aborts the others.
    let err = client.execute([
        client.logical_switch().add("ls3").unwrap(),
        Command::from(Operation::insert("Logical_Router", Row::new())),
    ]);
    assert!(err.is_err());
    assert!(client.logical_switch().get("ls3").is_err());
}

#[test]
fn cache_catches_up_when_updates_arrive() {
    let db = Arc::new(MemoryDatabase::with_config(
        MemoryDatabaseConfig::new().with_delivery(Delivery::Deferred),
    ));
    let client = open(&db);

    run(&client, client.logical_switch().add("ls1"));
    assert!(client.logical_switch().get("ls1").unwrap_err().is_not_found());
    assert_eq!(db.row_count("Logical_Switch"), 1);

    assert_eq!(db.flush(), 1);
    assert_eq!(client.logical_switch().get("ls1").unwrap().name, "ls1");
}

#[test]
fn set_shaped_references_are_read_too() {
    let db = Arc::new(MemoryDatabase::with_config(
        MemoryDatabaseConfig::new().with_bare_singletons(false),
    ));
    seed_switch(&db, "ls1", &["p1"]).unwrap();
    seed_acl(&db, "ls1", acl_row("to-lport", "ip4", 5, "allow")).unwrap();
    let client = open(&db);

    assert_eq!(client.logical_port().list_by_switch("ls1").unwrap().len(), 1);
    assert!(client
        .acl()
        .add("ls1", &AclSpec::new("to-lport", "ip4", "allow", 5))
        .unwrap_err()
        .is_already_exists());
    run(&client, client.logical_port().del("p1"));
    assert!(client.logical_switch().get("ls1").unwrap().ports.is_empty());
}

#[test]
fn readers_never_see_half_applied_batches() {
    let db = Arc::new(MemoryDatabase::new());
    seed_switch(&db, "ls1", &["p1"]).unwrap();
    let client = open(&db);
    let port = client
        .cache()
        .row_id("Logical_Switch_Port", &Criteria::named("p1"))
        .unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for n in 0..200u32 {
                let value = format!("00:00:00:00:00:01 10.0.{}.{}", n / 256, n % 256);
                let row = Row::new()
                    .with("addresses", vec![value.clone()])
                    .with("port_security", vec![value]);
                let update = Operation::update("Logical_Switch_Port", row)
                    .filter(ovnnb_protocol::Condition::equals("name", "p1"));
                client.execute([Command::from(update)]).unwrap();
            }
        });
        scope.spawn(|| {
            for _ in 0..2000 {
                client.cache().read(|tables| {
                    let row = tables.row("Logical_Switch_Port", &port).unwrap();
                    let addresses = row.get("addresses").and_then(FieldValue::strings);
                    let security = row.get("port_security").and_then(FieldValue::strings);
                    if addresses != Some(vec!["00:00:00:00:00:01 10.0.0.1".to_string()]) {
                        assert_eq!(addresses, security);
                    }
                });
            }
        });
    });
}

#[test]
fn closed_client_stops_sending() {
    let db = Arc::new(MemoryDatabase::new());
    let client = open(&db);
    client.close().unwrap();

    assert!(!client.transport().is_connected());
    assert!(matches!(client.logical_switch().add("ls1"), Err(NbError::Closed)));
    assert_eq!(db.transaction_count(), 0);
}

proptest! {
    #[test]
    fn both_reference_shapes_project_alike((refs, encoded) in ref_shape_strategy()) {
        let transport = ovnnb_client::MockTransport::new();
        transport.set_snapshot(
            TableUpdates::new()
                .with(
                    "Logical_Switch",
                    RowId::new("s-bare"),
                    ovnnb_protocol::RowUpdate::upsert(
                        Row::new().with("name", "bare").with("ports", encoded),
                    ),
                )
                .with(
                    "Logical_Switch",
                    RowId::new("s-set"),
                    ovnnb_protocol::RowUpdate::upsert(
                        Row::new()
                            .with("name", "set")
                            .with("ports", RefSet::from_iter(refs.iter().cloned())),
                    ),
                ),
        );
        let client = NbClient::open(ClientConfig::default(), transport).unwrap();

        let bare = client.logical_switch().get("bare").unwrap();
        let set = client.logical_switch().get("set").unwrap();
        prop_assert_eq!(&bare.ports, &set.ports);
        prop_assert_eq!(&bare.ports, &refs);
        for id in refs.iter() {
            prop_assert_eq!(
                client.cache().row_id_referencing("Logical_Switch", "ports", id),
                Some(RowId::new("s-bare"))
            );
        }
    }
}
