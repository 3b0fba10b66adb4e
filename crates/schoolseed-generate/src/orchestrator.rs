use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use rand::Rng;
use rand::seq::IndexedRandom;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

use schoolseed_core::{
    AssessmentRecord, CourseId, CourseRecord, NewCourse, NewSubject, Phase, PhasePlan, Role,
    Shift, SubjectRecord, UserId, Weekday, course_name,
};

use crate::binder;
use crate::bootstrap::Bootstrap;
use crate::catalog::{curriculum, slots_for};
use crate::errors::GenerationError;
use crate::factory::{AgeRange, EmailRegistry, EmailSeed, EntityFactory};
use crate::fixtures;
use crate::grading;
use crate::locale;
use crate::messaging;
use crate::model::{
    GenerateOptions, GenerationIssue, GenerationReport, PhaseReport, PhaseStatus,
};
use crate::random::phase_rng;
use crate::schedule;
use crate::store::Store;

/// Row totals logged and returned at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub courses: u64,
    pub teachers: u64,
    pub preceptors: u64,
    pub students: u64,
    pub parents: u64,
    pub subjects: u64,
    pub timetables: u64,
    pub assessments: u64,
    pub grades: u64,
    pub messages: u64,
    pub subject_messages: u64,
}

impl RunSummary {
    fn from_report(report: &GenerationReport) -> Self {
        Self {
            courses: report.total_created("courses"),
            teachers: report.total_created("teachers"),
            preceptors: report.total_created("preceptors"),
            students: report.total_created("students"),
            parents: report.total_created("parents"),
            subjects: report.total_created("subjects"),
            timetables: report.total_created("timetables"),
            assessments: report.total_created("assessments"),
            grades: report.total_created("grades"),
            messages: report.total_created("messages"),
            subject_messages: report.total_created("subject_messages"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub report: GenerationReport,
    pub summary: RunSummary,
}

/// Entities produced earlier in the run that later phases build on.
struct RunState {
    emails: EmailRegistry,
    admin: Option<UserId>,
    teachers: Vec<UserId>,
    preceptors: Vec<UserId>,
    courses: Vec<CourseRecord>,
    subjects: Vec<SubjectRecord>,
    assessments: Vec<AssessmentRecord>,
}

impl RunState {
    fn new(max_email_attempts: u32) -> Self {
        Self {
            emails: EmailRegistry::new(max_email_attempts),
            admin: None,
            teachers: Vec::new(),
            preceptors: Vec::new(),
            courses: Vec::new(),
            subjects: Vec::new(),
            assessments: Vec::new(),
        }
    }
}

/// Per-phase scratch: the phase's random stream, its counts and warnings.
struct PhaseScope {
    phase: Phase,
    rng: ChaCha8Rng,
    report: PhaseReport,
    warnings: Vec<GenerationIssue>,
}

impl PhaseScope {
    fn warn(&mut self, code: &str, message: String) {
        self.warnings.push(GenerationIssue {
            code: code.to_string(),
            message,
            phase: self.phase,
        });
    }
}

/// Runs phase plans against a [`Store`], one commit per phase.
pub struct GenerationEngine {
    options: GenerateOptions,
    factory: EntityFactory,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Result<Self, GenerationError> {
        options.validate()?;
        let reference_date = options
            .reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        Ok(Self {
            factory: EntityFactory::new(reference_date),
            options,
        })
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.factory.reference_date()
    }

    /// Executes `plan` phase by phase. A failing phase is aborted and ends the
    /// run; phases committed before it stay committed.
    pub async fn run(
        &self,
        plan: &PhasePlan,
        store: &mut dyn Store,
        bootstrap: &dyn Bootstrap,
    ) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut report =
            GenerationReport::new(run_id.clone(), self.options.seed, self.reference_date());
        let mut state = RunState::new(self.options.max_email_attempts);

        info!(
            run_id = %run_id,
            phases = plan.len(),
            seed = self.options.seed,
            reference_date = %self.reference_date(),
            "generation started"
        );

        for phase in plan.phases() {
            let phase_start = Instant::now();
            let mut scope = PhaseScope {
                phase,
                rng: phase_rng(self.options.seed, phase),
                report: PhaseReport::new(phase),
                warnings: Vec::new(),
            };
            info!(phase = %phase, "phase started");

            let outcome = match store.begin_phase(phase).await {
                Ok(()) => {
                    match self
                        .run_phase(&mut scope, &mut state, store, bootstrap)
                        .await
                    {
                        Ok(()) => store.commit_phase().await.map_err(GenerationError::from),
                        Err(err) => {
                            if let Err(abort_err) = store.abort_phase().await {
                                warn!(phase = %phase, error = %abort_err, "phase abort failed");
                            }
                            Err(err)
                        }
                    }
                }
                Err(err) => Err(err.into()),
            };

            let PhaseScope {
                report: mut phase_report,
                warnings,
                ..
            } = scope;
            phase_report.duration_ms = phase_start.elapsed().as_millis() as u64;
            for issue in warnings {
                log_issue(&issue);
                report.record_warning(issue);
            }

            match outcome {
                Ok(()) => {
                    info!(
                        phase = %phase,
                        created = phase_report.created.values().sum::<u64>(),
                        skipped = phase_report.skipped.values().sum::<u64>(),
                        duration_ms = phase_report.duration_ms,
                        "phase committed"
                    );
                    for (entity, count) in &phase_report.created {
                        info!(phase = %phase, entity = %entity, created = *count, "entity batch");
                    }
                    report.phases.push(phase_report);
                }
                Err(err) => {
                    phase_report.status = PhaseStatus::Failed;
                    phase_report.error = Some(err.to_string());
                    report.phases.push(phase_report);
                    report.duration_ms = start.elapsed().as_millis() as u64;
                    warn!(run_id = %run_id, phase = %phase, error = %err, "generation failed");
                    return Err(GenerationError::PhaseFailed {
                        phase,
                        source: Box::new(err),
                        report: Box::new(report),
                    });
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        let summary = RunSummary::from_report(&report);
        info!(
            run_id = %run_id,
            courses = summary.courses,
            teachers = summary.teachers,
            preceptors = summary.preceptors,
            students = summary.students,
            parents = summary.parents,
            subjects = summary.subjects,
            timetables = summary.timetables,
            assessments = summary.assessments,
            grades = summary.grades,
            messages = summary.messages,
            subject_messages = summary.subject_messages,
            duration_ms = report.duration_ms,
            "generation completed"
        );
        Ok(GenerationResult { report, summary })
    }

    async fn run_phase(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
        bootstrap: &dyn Bootstrap,
    ) -> Result<(), GenerationError> {
        let fixture_layout = &self.options.fixtures.layout;
        match scope.phase {
            Phase::Admin => self.create_admin(scope, state, store).await,
            Phase::Teachers => {
                state.teachers = self
                    .create_staff(scope, state, store, Role::Teacher, "prof", self.options.teachers)
                    .await?;
                scope.report.record_created("teachers", state.teachers.len() as u64);
                Ok(())
            }
            Phase::Preceptors => {
                state.preceptors = self
                    .create_staff(
                        scope,
                        state,
                        store,
                        Role::Preceptor,
                        "prec",
                        self.options.preceptors,
                    )
                    .await?;
                scope.report.record_created("preceptors", state.preceptors.len() as u64);
                Ok(())
            }
            Phase::Courses => self.create_courses(scope, state, store).await,
            Phase::StudentsAndParents => self.create_students(scope, state, store).await,
            Phase::Subjects => self.create_subjects(scope, state, store).await,
            Phase::Timetables => self.create_timetables(scope, state, store).await,
            Phase::Assessments => self.create_assessments(scope, state, store).await,
            Phase::Grades => self.create_grades(scope, state, store).await,
            Phase::Messages => self.create_messages(scope, state, store).await,
            Phase::SubjectMessages => self.create_subject_messages(scope, state, store).await,
            Phase::FixtureCourses => {
                fixtures::create_courses(store, fixture_layout, &mut scope.report).await
            }
            Phase::FixtureUsers => {
                fixtures::create_users(store, fixture_layout, bootstrap, &mut scope.report).await
            }
            Phase::FixturePreceptors => {
                fixtures::create_preceptors(store, fixture_layout, &mut scope.report).await
            }
            Phase::FixtureTimetables => {
                fixtures::create_timetables(store, fixture_layout, &mut scope.report).await
            }
        }
    }

    /// Creates the admin. Its email does not depend on the seed, so seeding
    /// a database that already holds a run fails here on the unique email.
    async fn create_admin(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        let seed = EmailSeed::fixed("admin", &self.options.school_domain);
        let email = state.emails.claim(&seed)?;
        let user = self.factory.make_user(Role::Admin, email);
        let admin_id = store.insert_user(&user).await?;
        let person = self.factory.make_person(AgeRange::STAFF, &mut scope.rng);
        store.insert_personal_data(admin_id, &person).await?;
        state.admin = Some(admin_id);
        scope.report.record_created("admin", 1);
        scope.report.record_created("personal_data", 1);
        Ok(())
    }

    async fn create_staff(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
        role: Role,
        tag: &str,
        count: usize,
    ) -> Result<Vec<UserId>, GenerationError> {
        let mut ids = Vec::with_capacity(count);
        for idx in 0..count {
            let seed = self.factory.name_seed(
                &mut scope.rng,
                tag,
                idx as u32,
                &self.options.school_domain,
            );
            let email = state.emails.claim(&seed)?;
            let user = self.factory.make_user(role, email);
            let user_id = store.insert_user(&user).await?;
            let person = self.factory.make_person(AgeRange::STAFF, &mut scope.rng);
            store.insert_personal_data(user_id, &person).await?;
            ids.push(user_id);
        }
        scope.report.record_created("personal_data", ids.len() as u64);
        Ok(ids)
    }

    async fn create_courses(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        let layout = &self.options.layout;
        let mut courses = Vec::with_capacity(layout.course_count());
        for slot in layout.slots() {
            let shift = match self.options.shift_policy.fixed_shift(slot.level, slot.division) {
                Some(shift) => shift,
                None => random_shift(&mut scope.rng),
            };
            let course = NewCourse {
                year: slot.year,
                division: slot.division,
                level: slot.level,
                shift,
                name: course_name(slot.year, slot.level, slot.division),
            };
            let id = store.insert_course(&course).await?;
            courses.push(CourseRecord {
                id,
                year: course.year,
                division: course.division,
                level: course.level,
                shift: course.shift,
                name: course.name,
                preceptor_id: None,
            });
        }
        scope.report.record_created("courses", courses.len() as u64);

        let plan = binder::plan_preceptors(&courses, &state.preceptors);
        for assignment in &plan.assignments {
            store
                .assign_preceptor(assignment.course_id, assignment.preceptor_id)
                .await?;
            if let Some(course) = courses.iter_mut().find(|c| c.id == assignment.course_id) {
                course.preceptor_id = Some(assignment.preceptor_id);
            }
        }
        scope
            .report
            .record_created("preceptor_assignments", plan.assignments.len() as u64);
        let uncovered = courses.len() - plan.assignments.len();
        scope.report.record_skipped("preceptor_assignments", uncovered as u64);
        for year in &plan.uncovered_years {
            scope.warn(
                "course_without_preceptor",
                format!("no preceptor left for year {year}"),
            );
        }

        state.courses = courses;
        Ok(())
    }

    async fn create_students(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        let mut students = 0_u64;
        for course in &state.courses {
            let count = scope
                .rng
                .random_range(self.options.students_min..=self.options.students_max);
            let cohort = format!("{}{}", course.year, course.division);
            for idx in 0..count {
                let student_seed = EmailSeed::new(
                    &["est", locale::last_name(&mut scope.rng), cohort.as_str()],
                    "",
                    idx as u32,
                    &self.options.school_domain,
                );
                let email = state.emails.claim(&student_seed)?;
                let user = self.factory.make_user(Role::Student, email);
                let student_id = store.insert_user(&user).await?;
                let person = self
                    .factory
                    .make_person(AgeRange::student(course.year), &mut scope.rng);
                store.insert_personal_data(student_id, &person).await?;

                store.assign_course(student_id, course.id).await?;

                let father_seed = EmailSeed::new(
                    &["padre", locale::last_name(&mut scope.rng), cohort.as_str()],
                    "",
                    idx as u32,
                    &self.options.family_domain,
                );
                let email = state.emails.claim(&father_seed)?;
                let user = self.factory.make_user(Role::Father, email);
                let father_id = store.insert_user(&user).await?;
                let person = self.factory.make_person(AgeRange::PARENT, &mut scope.rng);
                store.insert_personal_data(father_id, &person).await?;

                store.insert_family(student_id, father_id).await?;
                students += 1;
            }
        }
        scope.report.record_created("students", students);
        scope.report.record_created("parents", students);
        scope.report.record_created("families", students);
        scope.report.record_created("enrollments", students);
        scope.report.record_created("personal_data", students * 2);
        Ok(())
    }

    async fn create_subjects(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        if state.teachers.is_empty() {
            scope.warn(
                "subject_without_teacher",
                "teacher pool is empty; subjects are created without a teacher".to_string(),
            );
        }
        let mut subjects = Vec::new();
        for course in &state.courses {
            for name in curriculum(course.level) {
                let subject = NewSubject {
                    name: name.to_string(),
                    course_id: course.id,
                    teacher_id: state.teachers.choose(&mut scope.rng).copied(),
                };
                let id = store.insert_subject(&subject).await?;
                subjects.push(SubjectRecord {
                    id,
                    name: subject.name,
                    course_id: subject.course_id,
                    teacher_id: subject.teacher_id,
                });
            }
        }
        scope.report.record_created("subjects", subjects.len() as u64);
        state.subjects = subjects;
        Ok(())
    }

    async fn create_timetables(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        let mut created = 0_u64;
        let mut empty_slots = 0_u64;
        for course in &state.courses {
            let subjects: Vec<SubjectRecord> = state
                .subjects
                .iter()
                .filter(|subject| subject.course_id == course.id)
                .cloned()
                .collect();
            let entries = schedule::allocate(course, &subjects, &mut scope.rng);
            for entry in &entries {
                store.insert_timetable(entry).await?;
            }
            let capacity = slots_for(course.shift).len() * Weekday::ALL.len();
            empty_slots += (capacity - entries.len()) as u64;
            created += entries.len() as u64;
        }
        scope.report.record_created("timetables", created);
        scope.report.record_skipped("timetable_slots", empty_slots);
        Ok(())
    }

    async fn create_assessments(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        let mut assessments = Vec::new();
        for subject in &state.subjects {
            for assessment in
                grading::generate_assessments(subject.id, self.reference_date(), &mut scope.rng)
            {
                let id = store.insert_assessment(&assessment).await?;
                assessments.push(AssessmentRecord {
                    id,
                    assessment_type: assessment.assessment_type,
                    subject_id: assessment.subject_id,
                });
            }
        }
        scope.report.record_created("assessments", assessments.len() as u64);
        state.assessments = assessments;
        Ok(())
    }

    async fn create_grades(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        let subject_course: HashMap<_, CourseId> = state
            .subjects
            .iter()
            .map(|subject| (subject.id, subject.course_id))
            .collect();
        let mut rosters: HashMap<CourseId, Vec<UserId>> = HashMap::new();
        let mut created = 0_u64;
        let mut without_roster = 0_u64;

        for assessment in &state.assessments {
            let Some(course_id) = subject_course.get(&assessment.subject_id).copied() else {
                without_roster += 1;
                continue;
            };
            if !rosters.contains_key(&course_id) {
                let roster = store.course_roster(course_id).await?;
                rosters.insert(course_id, roster);
            }
            let roster = rosters.get(&course_id).map(Vec::as_slice).unwrap_or(&[]);
            let grades = grading::generate_grades(assessment, roster, &mut scope.rng);
            if grades.is_empty() {
                without_roster += 1;
            }
            for grade in &grades {
                store.insert_grade(grade).await?;
            }
            created += grades.len() as u64;
        }

        scope.report.record_created("grades", created);
        scope.report.record_skipped("ungraded_assessments", without_roster);
        if without_roster > 0 {
            scope.warn(
                "empty_roster",
                format!("{without_roster} assessments have no students to grade"),
            );
        }
        Ok(())
    }

    async fn create_messages(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        let staff: Vec<Role> = Role::ALL
            .iter()
            .copied()
            .filter(|role| role.is_staff())
            .collect();
        let mut senders = store.users_with_roles(&staff).await?;
        if let Some(admin) = state.admin {
            if !senders.contains(&admin) {
                senders.push(admin);
            }
        }
        let courses: Vec<CourseId> = state.courses.iter().map(|course| course.id).collect();
        if senders.is_empty() || courses.is_empty() {
            scope.warn(
                "empty_sender_pool",
                format!(
                    "{} senders and {} courses; no broadcast messages written",
                    senders.len(),
                    courses.len()
                ),
            );
        }

        let broadcasts = messaging::generate_broadcasts(
            self.options.broadcast_messages,
            &senders,
            &courses,
            &mut scope.rng,
        );
        let mut links = 0_u64;
        for broadcast in &broadcasts {
            let message_id = store.insert_message(&broadcast.message).await?;
            for course_id in &broadcast.courses {
                store.link_message_course(message_id, *course_id).await?;
                links += 1;
            }
        }
        scope.report.record_created("messages", broadcasts.len() as u64);
        scope.report.record_created("message_courses", links);
        Ok(())
    }

    async fn create_subject_messages(
        &self,
        scope: &mut PhaseScope,
        state: &mut RunState,
        store: &mut dyn Store,
    ) -> Result<(), GenerationError> {
        let mut created = 0_u64;
        let mut without_sender = 0_u64;
        for subject in &state.subjects {
            let messages = messaging::generate_subject_messages(subject, &mut scope.rng);
            if subject.teacher_id.is_none() {
                without_sender += messages.len() as u64;
            }
            for message in &messages {
                store.insert_subject_message(message).await?;
            }
            created += messages.len() as u64;
        }
        scope.report.record_created("subject_messages", created);
        if without_sender > 0 {
            scope.warn(
                "subject_message_without_sender",
                format!("{without_sender} subject messages have no sender"),
            );
        }
        Ok(())
    }
}

fn random_shift<R: Rng + ?Sized>(rng: &mut R) -> Shift {
    if rng.random_bool(0.5) {
        Shift::Morning
    } else {
        Shift::Afternoon
    }
}

fn log_issue(issue: &GenerationIssue) {
    warn!(
        code = %issue.code,
        phase = %issue.phase,
        message = %issue.message
    );
}
