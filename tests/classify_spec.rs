use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use feedback_lens::classify::*;
use feedback_lens::input::split_lines;
use feedback_lens::labels::aggregate;
use feedback_lens::models::*;
use speculate2::speculate;

/// What the scripted classifier does for one call.
enum Reply {
    /// One "General" item per input line.
    Echo,
    Items(Vec<ClassifiedItem>),
    Fail(&'static str),
}

/// Replays scripted replies in order and records every batch it receives.
#[derive(Default)]
struct ScriptedClassifier {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<String>>,
    cancel_on_call: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedClassifier {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    fn echo(batches: usize) -> Self {
        Self::new((0..batches).map(|_| Reply::Echo).collect())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Classifier for ScriptedClassifier {
    fn classify_batch<'a>(
        &'a self,
        batch: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ClassifiedItem>, ClassifierError>> {
        Box::pin(async move {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(batch.to_string());
                calls.len()
            };
            if let Some((n, flag)) = &self.cancel_on_call {
                if *n == call {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            tokio::task::yield_now().await;

            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Echo) => Ok(batch
                    .lines()
                    .map(|line| item(line, &["General"]))
                    .collect()),
                Some(Reply::Items(items)) => Ok(items),
                Some(Reply::Fail(msg)) => Err(ClassifierError::Server(msg.to_string())),
                None => Err(ClassifierError::EmptyResponse),
            }
        })
    }
}

fn item(feedback: &str, labels: &[&str]) -> ClassifiedItem {
    ClassifiedItem {
        feedback: feedback.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
    }
}

fn lines(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("feedback {i}")).collect()
}

fn run(
    classifier: &ScriptedClassifier,
    lines: &[String],
    batch_size: usize,
) -> Result<ClassifyOutcome, ClassifyError> {
    tokio_test::block_on(classify(classifier, lines, batch_size))
}

speculate! {
    describe "plan_batches" {
        it "splits N lines into ceil(N/B) newline-joined batches" {
            for (n, b) in [(1, 1), (5, 2), (6, 3), (7, 250), (251, 250), (1000, 250)] {
                let batches = plan_batches(&lines(n), b);
                assert_eq!(batches.len(), n.div_ceil(b), "n={} b={}", n, b);
                let rejoined: Vec<String> = batches
                    .iter()
                    .flat_map(|batch| batch.text.split('\n').map(str::to_string))
                    .collect();
                assert_eq!(rejoined, lines(n));
            }
        }
    }

    describe "BatchRunner" {
        it "issues one call per batch in input order" {
            let classifier = ScriptedClassifier::echo(3);
            let outcome = run(&classifier, &lines(5), 2).expect("run failed");

            assert_eq!(
                classifier.calls(),
                vec![
                    "feedback 1\nfeedback 2".to_string(),
                    "feedback 3\nfeedback 4".to_string(),
                    "feedback 5".to_string(),
                ]
            );
            let records = outcome.into_records();
            let texts: Vec<_> = records.iter().map(|r| r.text.clone()).collect();
            assert_eq!(texts, lines(5));
        }

        it "uses a default batch size of 250" {
            let classifier = ScriptedClassifier::echo(3);
            let outcome = tokio_test::block_on(
                ::feedback_lens::classify::BatchRunner::new(&classifier).run(&lines(600), |_| {}),
            )
            .expect("run failed");

            assert_eq!(classifier.calls().len(), 3);
            assert_eq!(outcome.into_records().len(), 600);
        }

        it "accepts short batch responses as-is" {
            let input = split_lines("Great app!\nCrashes on load\n\nNeeds dark mode");
            assert_eq!(input.len(), 3);

            let classifier = ScriptedClassifier::new(vec![
                Reply::Items(vec![item("Great app!", &["Positive"])]),
                Reply::Items(vec![
                    item("Crashes on load", &["Bug Report"]),
                    item("Needs dark mode", &["Feature Request"]),
                ]),
            ]);
            let records = run(&classifier, &input, 2).expect("run failed").into_records();

            assert_eq!(records.len(), 3);
            assert_eq!(records[0], FeedbackRecord::new("Great app!", vec!["Positive".into()]));
            assert_eq!(records[1].text, "Crashes on load");
            assert_eq!(records[2].labels, vec!["Feature Request"]);
            assert!(records.iter().all(|r| !r.is_incorrect));
        }

        it "reports count mismatches without rejecting them" {
            let classifier = ScriptedClassifier::new(vec![Reply::Items(vec![item("a", &["x"])])]);
            let mut events = Vec::new();
            let outcome = tokio_test::block_on(
                ::feedback_lens::classify::BatchRunner::new(&classifier)
                    .batch_size(3)
                    .run(&lines(3), |p| events.push(p.clone())),
            )
            .expect("run failed");

            assert_eq!(outcome.into_records().len(), 1);
            assert!(events.contains(&Progress::CountMismatch { index: 0, sent: 3, received: 1 }));
            assert_eq!(events.first(), Some(&Progress::Started { total_lines: 3, total_batches: 1 }));
            assert_eq!(events.last(), Some(&Progress::Finished { records: 1 }));
        }

        it "emits progress for every batch in order" {
            let classifier = ScriptedClassifier::echo(2);
            let mut events = Vec::new();
            tokio_test::block_on(
                ::feedback_lens::classify::BatchRunner::new(&classifier)
                    .batch_size(2)
                    .run(&lines(3), |p| events.push(p.clone())),
            )
            .expect("run failed");

            assert_eq!(
                events,
                vec![
                    Progress::Started { total_lines: 3, total_batches: 2 },
                    Progress::BatchStarted { index: 0, total: 2, lines: 2 },
                    Progress::BatchFinished { index: 0, total: 2, received: 2 },
                    Progress::BatchStarted { index: 1, total: 2, lines: 1 },
                    Progress::BatchFinished { index: 1, total: 2, received: 1 },
                    Progress::Finished { records: 3 },
                ]
            );
        }

        it "fails the whole run when one batch fails" {
            let classifier = ScriptedClassifier::new(vec![
                Reply::Echo,
                Reply::Fail("boom"),
                Reply::Echo,
            ]);
            let err = run(&classifier, &lines(6), 2).unwrap_err();

            match err {
                ClassifyError::Batch { index, source } => {
                    assert_eq!(index, 1);
                    assert!(matches!(source, ClassifierError::Server(ref m) if m == "boom"));
                }
                other => panic!("expected batch error, got {:?}", other),
            }
            assert_eq!(classifier.calls().len(), 2, "no batches after the failure");
        }

        it "reports an empty result distinctly from an error" {
            let classifier = ScriptedClassifier::new(vec![
                Reply::Items(Vec::new()),
                Reply::Items(Vec::new()),
            ]);
            let outcome = run(&classifier, &lines(4), 2).expect("run failed");

            assert_eq!(outcome, ClassifyOutcome::Empty);
            assert_eq!(classifier.calls().len(), 2);
        }

        it "rejects empty input before any call" {
            let classifier = ScriptedClassifier::echo(1);
            let err = run(&classifier, &[], 10).unwrap_err();
            assert!(matches!(err, ClassifyError::InputEmpty));
            assert!(classifier.calls().is_empty());
        }

        it "rejects a zero batch size" {
            let classifier = ScriptedClassifier::echo(1);
            let err = run(&classifier, &lines(2), 0).unwrap_err();
            assert!(matches!(err, ClassifyError::InvalidBatchSize));
            assert!(classifier.calls().is_empty());
        }
    }

    describe "cancellation" {
        it "issues no calls when cancelled up front" {
            let classifier = ScriptedClassifier::echo(2);
            let flag = Arc::new(AtomicBool::new(true));
            let result = tokio_test::block_on(
                ::feedback_lens::classify::BatchRunner::new(&classifier)
                    .batch_size(1)
                    .cancel_flag(flag)
                    .run(&lines(2), |_| {}),
            );

            assert!(matches!(result, Err(ClassifyError::Cancelled)));
            assert!(classifier.calls().is_empty());
        }

        it "drops the in-flight result and stops issuing batches" {
            let flag = Arc::new(AtomicBool::new(false));
            let classifier = ScriptedClassifier {
                cancel_on_call: Some((2, flag.clone())),
                ..ScriptedClassifier::echo(3)
            };
            let mut finished = 0;
            let result = tokio_test::block_on(
                ::feedback_lens::classify::BatchRunner::new(&classifier)
                    .batch_size(1)
                    .cancel_flag(flag)
                    .run(&lines(3), |p| {
                        if matches!(p, Progress::BatchFinished { .. }) {
                            finished += 1;
                        }
                    }),
            );

            assert!(matches!(result, Err(ClassifyError::Cancelled)));
            assert_eq!(classifier.calls().len(), 2);
            assert_eq!(finished, 1);
        }
    }

    describe "aggregation of classified records" {
        it "merges label variants across batches" {
            let classifier = ScriptedClassifier::new(vec![
                Reply::Items(vec![item("a", &["Bug", "#Bug"])]),
                Reply::Items(vec![item("b", &["  BUG ", "Praise"])]),
            ]);
            let records = run(&classifier, &lines(2), 1).expect("run failed").into_records();
            let counts = aggregate(&records);

            assert_eq!(counts[0], LabelCount { label: "bug".into(), count: 3 });
            assert_eq!(counts[1], LabelCount { label: "praise".into(), count: 1 });
        }
    }
}
