//! Integration tests for the full pipeline.
//!
//! Tests: Service → CommandDispatcher → EventStore → EventBus → Projection
//!
//! Verifies:
//! - Billing and statement figures for the reference scenarios
//! - Phase gating on documents and pending payment requests
//! - Number allocation under concurrent callers
//! - Optimistic concurrency conflicts are detected

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use clearway_accounting::{StatementFilter, TransactionKind};
    use clearway_billing::{
        CreditNoteStatus, CreditPolicy, CreditReason, InvoiceStatus, LineItem, OverpaymentPolicy,
        PaymentMethod,
    };
    use clearway_clearance::{
        CargoType, DocumentAttached, DocumentId, FileRef, PaymentRequestStatus, Phase,
        ShipmentEvent, ShipmentId, ShipmentStatus,
    };
    use clearway_core::{ClientId, ConsigneeId, Currency, DomainError, ExpectedVersion, TaxRate, UserId};
    use clearway_events::EventBus;

    use crate::config::Policies;
    use crate::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
    use crate::sequence::{DEFAULT_WIDTH, InMemoryCounterStore, SequenceAllocator, Series};
    use crate::services::{
        AttachDocumentInput, ClearwayServices, CreateCreditNoteInput, CreateInvoiceInput,
        EnvelopeBus, OpenShipmentInput, RecordReceiptInput, RecordTransactionInput,
        RequestPaymentInput, ServiceError, aggregate_types,
    };

    fn services() -> ClearwayServices {
        ClearwayServices::in_memory(Policies::default(), DEFAULT_WIDTH)
    }

    fn mzn() -> Currency {
        Currency::parse("MZN").unwrap()
    }

    fn file(name: &str) -> FileRef {
        FileRef {
            reference: format!("files/{name}.pdf"),
            size_bytes: 1024,
            checksum: None,
        }
    }

    fn open(services: &ClearwayServices, client_id: ClientId) -> ShipmentId {
        let input = OpenShipmentInput {
            client_id,
            consignee_id: ConsigneeId::new(),
            cargo_type: CargoType::Import,
            description: Some("Containers of machinery".to_string()),
        };
        services.open_shipment(input, UserId::new()).unwrap().id_typed()
    }

    fn attach(services: &ClearwayServices, shipment_id: ShipmentId, phase: Phase, code: &str) -> DocumentId {
        let input = AttachDocumentInput {
            phase,
            document_type: code.to_string(),
            file: file(code),
            note: None,
        };
        services.attach_document(shipment_id, input, UserId::new()).unwrap().1
    }

    fn satisfy(services: &ClearwayServices, shipment_id: ShipmentId, phase: Phase) {
        for code in phase.required_documents() {
            attach(services, shipment_id, phase, code);
        }
    }

    /// Open a shipment and walk it up to `target` with every gate satisfied.
    fn shipment_at(services: &ClearwayServices, client_id: ClientId, target: Phase) -> ShipmentId {
        let user = UserId::new();
        let shipment_id = open(services, client_id);
        services.advance_phase(shipment_id, user).unwrap();
        for phase in Phase::ALL {
            if phase == target {
                break;
            }
            satisfy(services, shipment_id, phase);
            services.advance_phase(shipment_id, user).unwrap();
        }
        shipment_id
    }

    /// Issued invoice of 2 × 100 at 17%.
    fn issued_invoice(services: &ClearwayServices, client_id: ClientId) -> clearway_billing::Invoice {
        let user = UserId::new();
        let input = CreateInvoiceInput {
            client_id,
            shipment_ids: vec![],
            currency: mzn(),
            issue_date: Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            items: vec![LineItem::new("Clearance services", 2, 100, TaxRate::percent(17))],
            notes: None,
        };
        let invoice = services.create_invoice(input, user).unwrap();
        services.issue_invoice(invoice.id_typed(), user).unwrap()
    }

    fn client_filter(client_id: ClientId) -> StatementFilter {
        StatementFilter {
            client_id: Some(client_id),
            ..StatementFilter::default()
        }
    }

    #[test]
    fn invoice_totals_are_derived_from_items() {
        let services = services();
        let invoice = issued_invoice(&services, ClientId::new());

        let totals = invoice.totals();
        assert_eq!(totals.subtotal, 200);
        assert_eq!(totals.tax_amount, 34);
        assert_eq!(totals.total, 234);
        assert_eq!(invoice.number(), "INV-00001");
        assert_eq!(invoice.status(), InvoiceStatus::Issued);
        assert_eq!(invoice.due_date(), NaiveDate::from_ymd_opt(2024, 3, 31));
    }

    #[test]
    fn full_receipt_pays_invoice_and_clears_outstanding() {
        let services = services();
        let client_id = ClientId::new();
        let invoice = issued_invoice(&services, client_id);

        let receipt = RecordReceiptInput {
            invoice_id: invoice.id_typed(),
            amount: 234,
            currency: mzn(),
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 10),
            method: PaymentMethod::BankTransfer,
            reference: Some("TRF-889".to_string()),
        };
        let invoice = services.record_receipt(receipt, UserId::new()).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.receipts()[0].number, "REC-00001");

        let statement = services.statement(&client_filter(client_id)).unwrap();
        assert_eq!(statement.entries.len(), 2);
        let summary = &statement.summary[0];
        assert_eq!(summary.total_invoiced, 234);
        assert_eq!(summary.total_received, 234);
        assert_eq!(summary.outstanding, 0);
    }

    #[test]
    fn partial_receipt_keeps_invoice_issued() {
        let services = services();
        let invoice = issued_invoice(&services, ClientId::new());

        let receipt = RecordReceiptInput {
            invoice_id: invoice.id_typed(),
            amount: 100,
            currency: mzn(),
            payment_date: None,
            method: PaymentMethod::Cash,
            reference: None,
        };
        let invoice = services.record_receipt(receipt, UserId::new()).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Issued);
        assert_eq!(invoice.outstanding(), 134);
    }

    #[test]
    fn receipt_in_other_currency_is_rejected() {
        let services = services();
        let invoice = issued_invoice(&services, ClientId::new());

        let receipt = RecordReceiptInput {
            invoice_id: invoice.id_typed(),
            amount: 234,
            currency: Currency::parse("USD").unwrap(),
            payment_date: None,
            method: PaymentMethod::Cash,
            reference: None,
        };
        let err = services.record_receipt(receipt, UserId::new()).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::CurrencyMismatch { .. })));
    }

    #[test]
    fn overpayment_is_rejected_under_reject_policy() {
        let policies = Policies {
            overpayment: OverpaymentPolicy::Reject,
            ..Policies::default()
        };
        let services = ClearwayServices::in_memory(policies, DEFAULT_WIDTH);
        let invoice = issued_invoice(&services, ClientId::new());

        let receipt = RecordReceiptInput {
            invoice_id: invoice.id_typed(),
            amount: 300,
            currency: mzn(),
            payment_date: None,
            method: PaymentMethod::Cash,
            reference: None,
        };
        let err = services.record_receipt(receipt, UserId::new()).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn issued_credit_note_counts_in_statement() {
        let services = services();
        let client_id = ClientId::new();
        let user = UserId::new();
        let invoice = issued_invoice(&services, client_id);

        let input = CreateCreditNoteInput {
            invoice_id: invoice.id_typed(),
            reason: CreditReason::BillingError,
            description: None,
            items: Some(vec![LineItem::new("Clearance services", 1, 100, TaxRate::percent(17))]),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 5),
        };
        let note = services.create_credit_note(input, user).unwrap();
        assert_eq!(note.number(), "NC-00001");
        assert_eq!(note.totals().total, 117);

        // Drafts stay off the statement.
        let before = services.statement(&client_filter(client_id)).unwrap();
        assert_eq!(before.summary[0].total_credit_notes, 0);

        services
            .change_credit_note_status(note.id_typed(), CreditNoteStatus::Issued, None, user)
            .unwrap();
        let after = services.statement(&client_filter(client_id)).unwrap();
        assert_eq!(after.summary[0].total_credit_notes, 117);
    }

    #[test]
    fn credit_cap_accounts_for_earlier_notes() {
        let policies = Policies {
            credit: CreditPolicy::CapAtInvoiceBalance,
            ..Policies::default()
        };
        let services = ClearwayServices::in_memory(policies, DEFAULT_WIDTH);
        let user = UserId::new();
        let invoice = issued_invoice(&services, ClientId::new());

        let one_unit = || CreateCreditNoteInput {
            invoice_id: invoice.id_typed(),
            reason: CreditReason::Discount,
            description: None,
            items: Some(vec![LineItem::new("Clearance services", 1, 100, TaxRate::percent(17))]),
            issue_date: None,
        };
        services.create_credit_note(one_unit(), user).unwrap();
        services.create_credit_note(one_unit(), user).unwrap();

        let err = services.create_credit_note(one_unit(), user).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    fn capped_services() -> ClearwayServices {
        let policies = Policies {
            credit: CreditPolicy::CapAtInvoiceBalance,
            ..Policies::default()
        };
        ClearwayServices::in_memory(policies, DEFAULT_WIDTH)
    }

    fn units(qty: i64) -> Vec<LineItem> {
        vec![LineItem::new("Clearance services", qty, 100, TaxRate::percent(17))]
    }

    #[test]
    fn credit_revision_counts_notes_raised_after_it() {
        let services = capped_services();
        let user = UserId::new();
        let invoice = issued_invoice(&services, ClientId::new());
        let input = || CreateCreditNoteInput {
            invoice_id: invoice.id_typed(),
            reason: CreditReason::BillingError,
            description: None,
            items: Some(units(1)),
            issue_date: None,
        };

        let first = services.create_credit_note(input(), user).unwrap();
        services.create_credit_note(input(), user).unwrap();

        let err = services
            .revise_credit_note_items(first.id_typed(), units(2))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        // Revising within its own share is still fine.
        let revised = services
            .revise_credit_note_items(first.id_typed(), units(1))
            .unwrap();
        assert_eq!(revised.totals().total, 117);
        assert_eq!(revised.credit_limit(), Some(117));
    }

    #[test]
    fn cancelled_notes_free_their_share_for_revisions() {
        let services = capped_services();
        let user = UserId::new();
        let invoice = issued_invoice(&services, ClientId::new());
        let input = || CreateCreditNoteInput {
            invoice_id: invoice.id_typed(),
            reason: CreditReason::Discount,
            description: None,
            items: Some(units(1)),
            issue_date: None,
        };

        let first = services.create_credit_note(input(), user).unwrap();
        let second = services.create_credit_note(input(), user).unwrap();
        services
            .change_credit_note_status(second.id_typed(), CreditNoteStatus::Cancelled, None, user)
            .unwrap();

        let revised = services
            .revise_credit_note_items(first.id_typed(), units(2))
            .unwrap();
        assert_eq!(revised.totals().total, 234);
    }

    #[test]
    fn concurrent_credit_notes_respect_the_cap() {
        const THREADS: usize = 16;
        let services = Arc::new(capped_services());
        let invoice = issued_invoice(&services, ClientId::new());
        let invoice_id = invoice.id_typed();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let services = services.clone();
                thread::spawn(move || {
                    services
                        .create_credit_note(
                            CreateCreditNoteInput {
                                invoice_id,
                                reason: CreditReason::Discount,
                                description: None,
                                items: Some(units(1)),
                                issue_date: None,
                            },
                            UserId::new(),
                        )
                        .map(|note| note.totals().total)
                })
            })
            .collect();
        let credited: Vec<i64> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap().ok())
            .collect();

        assert_eq!(credited.len(), 2);
        assert!(credited.iter().sum::<i64>() <= invoice.totals().total);
    }

    #[test]
    fn credit_note_needs_billed_invoice() {
        let services = services();
        let input = CreateInvoiceInput {
            client_id: ClientId::new(),
            shipment_ids: vec![],
            currency: mzn(),
            issue_date: None,
            items: vec![LineItem::new("Storage", 1, 50, TaxRate::ZERO)],
            notes: None,
        };
        let draft = services.create_invoice(input, UserId::new()).unwrap();

        let err = services
            .create_credit_note(
                CreateCreditNoteInput {
                    invoice_id: draft.id_typed(),
                    reason: CreditReason::Other,
                    description: None,
                    items: None,
                    issue_date: None,
                },
                UserId::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidTransition { .. })));
    }

    #[test]
    fn advance_is_blocked_until_phase_documents_exist() {
        let services = services();
        let user = UserId::new();
        let shipment_id = shipment_at(&services, ClientId::new(), Phase::Alfandegas);

        let err = services.advance_phase(shipment_id, user).unwrap_err();
        match err {
            ServiceError::Domain(DomainError::PhaseNotReady {
                phase,
                missing_documents,
                pending_payment_requests,
            }) => {
                assert_eq!(phase, "alfandegas");
                assert_eq!(
                    missing_documents,
                    vec!["customs_declaration", "cargo_manifest", "duty_assessment"]
                );
                assert_eq!(pending_payment_requests, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let unchanged = services.shipment(shipment_id).unwrap();
        assert_eq!(unchanged.current_phase(), Some(Phase::Alfandegas));

        satisfy(&services, shipment_id, Phase::Alfandegas);
        let shipment = services.advance_phase(shipment_id, user).unwrap();
        assert_eq!(shipment.current_phase(), Some(Phase::Cornelder));
        assert_eq!(shipment.status(), ShipmentStatus::Active);
    }

    #[test]
    fn advancing_past_pod_completes_the_shipment() {
        let services = services();
        let user = UserId::new();
        let shipment_id = shipment_at(&services, ClientId::new(), Phase::Pod);

        satisfy(&services, shipment_id, Phase::Pod);
        let shipment = services.advance_phase(shipment_id, user).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Completed);
        assert_eq!(shipment.current_phase(), Some(Phase::Pod));

        let err = services.advance_phase(shipment_id, user).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidTransition { .. })));
    }

    #[test]
    fn pending_payment_requests_block_advance_until_decided() {
        let services = services();
        let user = UserId::new();
        let shipment_id = shipment_at(&services, ClientId::new(), Phase::Cornelder);

        let request = services
            .request_payment(
                shipment_id,
                RequestPaymentInput {
                    phase: None,
                    description: "Port storage".to_string(),
                    amount: 5_000,
                    currency: mzn(),
                    quotation: file("quote-cornelder"),
                },
                user,
            )
            .unwrap();
        assert_eq!(request.phase(), Some(Phase::Cornelder));
        satisfy(&services, shipment_id, Phase::Cornelder);

        let readiness = services.readiness(shipment_id).unwrap();
        assert_eq!(readiness.pending_payment_requests, 1);
        assert!(!readiness.can_advance());

        let err = services.advance_phase(shipment_id, user).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::PhaseNotReady { pending_payment_requests: 1, .. })
        ));

        // Approved but not yet paid no longer counts as pending.
        let id = request.id_typed();
        services.approve_payment_request(id, None, user).unwrap();
        assert_eq!(services.readiness(shipment_id).unwrap().pending_payment_requests, 0);

        let shipment = services.advance_phase(shipment_id, user).unwrap();
        assert_eq!(shipment.current_phase(), Some(Phase::Taxacao));
    }

    #[test]
    fn payment_request_and_advance_do_not_interleave() {
        const ROUNDS: usize = 32;
        let services = Arc::new(services());

        for _ in 0..ROUNDS {
            let shipment_id = shipment_at(&services, ClientId::new(), Phase::Cornelder);
            satisfy(&services, shipment_id, Phase::Cornelder);
            let barrier = Arc::new(std::sync::Barrier::new(2));

            let advance = {
                let services = services.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    services.advance_phase(shipment_id, UserId::new())
                })
            };
            let request = {
                let services = services.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    services.request_payment(
                        shipment_id,
                        RequestPaymentInput {
                            phase: None,
                            description: "Port storage".to_string(),
                            amount: 5_000,
                            currency: mzn(),
                            quotation: file("quote-cornelder"),
                        },
                        UserId::new(),
                    )
                })
            };

            let advanced = advance.join().unwrap();
            let requested = request.join().unwrap().unwrap();

            // Either the request landed first and blocked the advance, or the
            // advance won and the request belongs to the next phase.
            match advanced {
                Ok(shipment) => {
                    assert_eq!(shipment.current_phase(), Some(Phase::Taxacao));
                    assert_eq!(requested.phase(), Some(Phase::Taxacao));
                }
                Err(err) => {
                    assert!(matches!(
                        err,
                        ServiceError::Domain(DomainError::PhaseNotReady {
                            pending_payment_requests: 1,
                            ..
                        })
                    ));
                    assert_eq!(requested.phase(), Some(Phase::Cornelder));
                }
            }
        }
    }

    #[test]
    fn settle_policy_off_ignores_open_requests() {
        let policies = Policies {
            settle_payment_requests: false,
            ..Policies::default()
        };
        let services = ClearwayServices::in_memory(policies, DEFAULT_WIDTH);
        let user = UserId::new();
        let shipment_id = shipment_at(&services, ClientId::new(), Phase::Legalizacao);

        services
            .request_payment(
                shipment_id,
                RequestPaymentInput {
                    phase: None,
                    description: "Legal fees".to_string(),
                    amount: 900,
                    currency: mzn(),
                    quotation: file("quote-legal"),
                },
                user,
            )
            .unwrap();
        satisfy(&services, shipment_id, Phase::Legalizacao);

        let shipment = services.advance_phase(shipment_id, user).unwrap();
        assert_eq!(shipment.current_phase(), Some(Phase::Alfandegas));
    }

    #[test]
    fn paying_twice_fails_and_counts_once() {
        let services = services();
        let client_id = ClientId::new();
        let user = UserId::new();
        let shipment_id = shipment_at(&services, client_id, Phase::Taxacao);

        let request = services
            .request_payment(
                shipment_id,
                RequestPaymentInput {
                    phase: None,
                    description: "Customs duties".to_string(),
                    amount: 12_000,
                    currency: mzn(),
                    quotation: file("duties"),
                },
                user,
            )
            .unwrap();
        let id = request.id_typed();
        services.approve_payment_request(id, Some("ok".to_string()), user).unwrap();
        let paid = services.mark_payment_request_paid(id, Some(11_500), None, user).unwrap();
        assert_eq!(paid.status(), PaymentRequestStatus::Paid);

        let err = services.mark_payment_request_paid(id, None, None, user).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidTransition { .. })));

        let statement = services.statement(&client_filter(client_id)).unwrap();
        assert_eq!(statement.entries.len(), 1);
        assert_eq!(statement.summary[0].total_costs, 11_500);
    }

    #[test]
    fn cancelled_shipment_refuses_payment_requests() {
        let services = services();
        let user = UserId::new();
        let shipment_id = open(&services, ClientId::new());
        services.advance_phase(shipment_id, user).unwrap();
        services.cancel_shipment(shipment_id, "client withdrew".to_string(), user).unwrap();

        let err = services
            .request_payment(
                shipment_id,
                RequestPaymentInput {
                    phase: None,
                    description: "Transport".to_string(),
                    amount: 100,
                    currency: mzn(),
                    quotation: file("transport"),
                },
                user,
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidTransition { .. })));
    }

    #[test]
    fn revert_returns_to_an_earlier_phase() {
        let services = services();
        let user = UserId::new();
        let shipment_id = shipment_at(&services, ClientId::new(), Phase::Alfandegas);

        let shipment = services
            .revert_phase(shipment_id, Phase::ColetaDispersa, Some("wrong B/L".to_string()), user)
            .unwrap();
        assert_eq!(shipment.current_phase(), Some(Phase::ColetaDispersa));
        // Documents stay attached: coleta and legalizacao uploads.
        assert_eq!(shipment.documents().documents().len(), 5);

        let err = services
            .revert_phase(shipment_id, Phase::Cornelder, None, user)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidTransition { .. })));
    }

    #[test]
    fn removed_document_is_resolved_through_the_index() {
        let services = services();
        let user = UserId::new();
        let shipment_id = open(&services, ClientId::new());
        services.advance_phase(shipment_id, user).unwrap();
        let doc = attach(&services, shipment_id, Phase::ColetaDispersa, "bill_of_lading");

        let shipment = services.remove_document(doc, user).unwrap();
        assert!(shipment.documents().get(doc).is_none());

        let err = services.remove_document(doc, user).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound)));
    }

    #[test]
    fn document_index_catches_up_after_unprojected_commit() {
        let services = services();
        let user = UserId::new();
        let shipment_id = open(&services, ClientId::new());

        // Commit straight to the store, bypassing the projections.
        let document_id = DocumentId::generate();
        let event = ShipmentEvent::DocumentAttached(DocumentAttached {
            shipment_id,
            document: clearway_clearance::Document {
                id: document_id,
                phase: Phase::ColetaDispersa,
                document_type: "packing_list".to_string(),
                file: file("packing"),
                note: None,
                uploaded_by: user,
                uploaded_at: Utc::now(),
            },
            occurred_at: Utc::now(),
        });
        let uncommitted = UncommittedEvent::from_typed(
            shipment_id.aggregate_id(),
            aggregate_types::SHIPMENT,
            Uuid::now_v7(),
            &event,
        )
        .unwrap();
        services
            .dispatcher()
            .store()
            .append(vec![uncommitted], ExpectedVersion::Exact(1))
            .unwrap();

        // The next projected commit sees a gap and replays the stream.
        services.advance_phase(shipment_id, user).unwrap();
        let shipment = services.remove_document(document_id, user).unwrap();
        assert!(shipment.documents().documents().is_empty());
    }

    #[test]
    fn read_models_are_rebuilt_from_history() {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        let counters = Arc::new(InMemoryCounterStore::new());
        let user = UserId::new();

        let first = ClearwayServices::new(
            store.clone(),
            counters.clone(),
            Arc::new(EnvelopeBus::new()),
            Policies::default(),
            DEFAULT_WIDTH,
        )
        .unwrap();
        let shipment_id = open(&first, ClientId::new());
        first.advance_phase(shipment_id, user).unwrap();
        let doc = attach(&first, shipment_id, Phase::ColetaDispersa, "commercial_invoice");
        drop(first);

        let second = ClearwayServices::new(
            store,
            counters.clone(),
            Arc::new(EnvelopeBus::new()),
            Policies::default(),
            DEFAULT_WIDTH,
        )
        .unwrap();
        second.remove_document(doc, user).unwrap();

        // Counters survive too.
        let next = open(&second, ClientId::new());
        assert_eq!(second.shipment(next).unwrap().reference(), "PRC-00002");
        assert_eq!(counters.current("shipment"), 2);
    }

    #[test]
    fn stale_append_is_a_concurrency_conflict() {
        let services = services();
        let shipment_id = open(&services, ClientId::new());

        let event = ShipmentEvent::DocumentAttached(DocumentAttached {
            shipment_id,
            document: clearway_clearance::Document {
                id: DocumentId::generate(),
                phase: Phase::ColetaDispersa,
                document_type: "outro".to_string(),
                file: file("misc"),
                note: None,
                uploaded_by: UserId::new(),
                uploaded_at: Utc::now(),
            },
            occurred_at: Utc::now(),
        });
        let uncommitted = UncommittedEvent::from_typed(
            shipment_id.aggregate_id(),
            aggregate_types::SHIPMENT,
            Uuid::now_v7(),
            &event,
        )
        .unwrap();

        // The stream is at version 1; a writer that loaded version 0 loses.
        let err = services
            .dispatcher()
            .store()
            .append(vec![uncommitted], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(err.is_concurrency());
        assert!(matches!(ServiceError::from(err), ServiceError::Concurrency(_)));
    }

    #[test]
    fn committed_events_reach_bus_subscribers() {
        let services = services();
        let sub = services.bus().subscribe();

        let shipment_id = open(&services, ClientId::new());

        let env = sub.try_recv().unwrap();
        assert_eq!(env.aggregate_id(), shipment_id.aggregate_id());
        assert_eq!(env.aggregate_type(), aggregate_types::SHIPMENT);
        assert_eq!(env.event_type(), "clearance.shipment.opened");
        assert_eq!(env.sequence_number(), 1);
    }

    #[test]
    fn voided_transactions_drop_out_of_the_statement() {
        let services = services();
        let client_id = ClientId::new();
        let user = UserId::new();

        let income = services
            .record_transaction(
                RecordTransactionInput {
                    kind: TransactionKind::Income,
                    amount: 700,
                    currency: mzn(),
                    client_id: Some(client_id),
                    shipment_id: None,
                    description: "Handling surcharge".to_string(),
                    category: Some("surcharge".to_string()),
                    date: None,
                },
                user,
            )
            .unwrap();
        services
            .record_transaction(
                RecordTransactionInput {
                    kind: TransactionKind::Expense,
                    amount: 300,
                    currency: mzn(),
                    client_id: Some(client_id),
                    shipment_id: None,
                    description: "Courier".to_string(),
                    category: None,
                    date: None,
                },
                user,
            )
            .unwrap();

        let summary = &services.statement(&client_filter(client_id)).unwrap().summary[0];
        assert_eq!(summary.other_income, 700);
        assert_eq!(summary.total_costs, 300);

        services.void_transaction(income.id_typed(), "duplicate".to_string(), user).unwrap();
        let statement = services.statement(&client_filter(client_id)).unwrap();
        assert_eq!(statement.entries.len(), 1);
        assert_eq!(statement.summary[0].other_income, 0);
    }

    #[test]
    fn inverted_date_range_is_a_validation_error() {
        let filter = StatementFilter {
            from: NaiveDate::from_ymd_opt(2024, 5, 1),
            to: NaiveDate::from_ymd_opt(2024, 4, 1),
            ..StatementFilter::default()
        };
        let err = services().statement(&filter).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn statement_totals_beyond_i64_are_rejected_not_wrapped() {
        let services = services();
        let user = UserId::new();
        let client_id = ClientId::new();
        for _ in 0..2 {
            let input = CreateInvoiceInput {
                client_id,
                shipment_ids: vec![],
                currency: mzn(),
                issue_date: None,
                items: vec![LineItem::new("Bulk clearance", 1, i64::MAX / 2 + 10, TaxRate::ZERO)],
                notes: None,
            };
            let invoice = services.create_invoice(input, user).unwrap();
            services.issue_invoice(invoice.id_typed(), user).unwrap();
        }

        let err = services.statement(&client_filter(client_id)).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn two_concurrent_allocations_on_empty_counter() {
        let allocator = Arc::new(SequenceAllocator::new(Arc::new(InMemoryCounterStore::new())));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let allocator = allocator.clone();
                thread::spawn(move || allocator.next(Series::INVOICE).unwrap())
            })
            .collect();
        let numbers: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let expected: HashSet<String> =
            ["INV-00001".to_string(), "INV-00002".to_string()].into_iter().collect();
        assert_eq!(numbers, expected);
    }

    #[test]
    fn concurrent_shipments_get_distinct_references() {
        const THREADS: usize = 64;
        let services = Arc::new(services());

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let services = services.clone();
                thread::spawn(move || {
                    let id = open(&services, ClientId::new());
                    services.shipment(id).unwrap().reference().to_string()
                })
            })
            .collect();
        let references: HashSet<String> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(references.len(), THREADS);
        assert!(references.contains("PRC-00001"));
        assert!(references.contains(&format!("PRC-{THREADS:05}")));
    }
}
