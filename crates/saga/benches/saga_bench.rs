use std::sync::Arc;

use common::ResourceId;
use criterion::{Criterion, criterion_group, criterion_main};
use origination::{
    InMemoryOriginationApi, Operation, PartyRole, RegisterApplication, RegisterDocument,
    RegisterOffer, RegisterParty, ResourceError, ResourceKind, SubmitApplication, build_bus,
};
use saga::{LoanApplicationSagas, RetryPolicy, SagaSettings, TracingEmitter};

fn submission() -> SubmitApplication {
    SubmitApplication::new(RegisterApplication::new("PERSONAL", 1_500_000, "EUR", 36))
        .with_party(RegisterParty::new(ResourceId::new(), PartyRole::Borrower))
        .with_party(RegisterParty::new(ResourceId::new(), PartyRole::CoBorrower))
        .with_document(RegisterDocument::new("payslip", "s3://docs/p.pdf"))
        .with_offer(RegisterOffer::new(1_500_000, 36, 549))
}

fn sagas(api: Arc<InMemoryOriginationApi>) -> LoanApplicationSagas {
    let bus = build_bus(api).unwrap();
    let settings = SagaSettings::default().with_step_retry(RetryPolicy::no_retry());
    LoanApplicationSagas::with_bus(bus, Arc::new(TracingEmitter), settings)
}

fn bench_submit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let sagas = sagas(Arc::new(InMemoryOriginationApi::new()));

    c.bench_function("saga/submit_application", |b| {
        b.iter(|| {
            rt.block_on(async {
                sagas.submit(submission()).await.unwrap();
            });
        });
    });
}

fn bench_submit_with_compensation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let api = Arc::new(InMemoryOriginationApi::new());
    rt.block_on(api.fail(
        Operation::Create(ResourceKind::Offer),
        ResourceError::Invalid("rate out of range".into()),
    ));
    let sagas = sagas(api);

    c.bench_function("saga/submit_and_compensate", |b| {
        b.iter(|| {
            rt.block_on(async {
                sagas.submit(submission()).await.unwrap_err();
            });
        });
    });
}

criterion_group!(benches, bench_submit, bench_submit_with_compensation);
criterion_main!(benches);
