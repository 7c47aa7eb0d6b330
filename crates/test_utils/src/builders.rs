//! Test Data Builders
//!
//! Builders for ledger entities with sensible defaults. Tests set only the
//! fields they care about. The built values are plain domain objects; they
//! have not passed through a store, so numbering is taken as given.

use chrono::NaiveDate;
use core_kernel::{
    AcademicYearId, BillId, Currency, FeeCategoryId, GuardianId, Money, StudentId, UserId,
};
use domain_billing::{
    Bill, BillingPeriod, Direction, Payment, PaymentMethod, PaymentTransaction,
    StatementLineInput, StatementMetadata,
};

use crate::fixtures::{DateFixtures, IdFixtures, MoneyFixtures, StringFixtures};

/// Builder for bills
pub struct BillBuilder {
    student_id: StudentId,
    category_id: FeeCategoryId,
    academic_year_id: AcademicYearId,
    month: Option<u32>,
    amount_due: Money,
    due_date: NaiveDate,
}

impl Default for BillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BillBuilder {
    /// January tuition for the fixture student
    pub fn new() -> Self {
        Self {
            student_id: IdFixtures::student_id(),
            category_id: IdFixtures::tuition_category(),
            academic_year_id: IdFixtures::academic_year(),
            month: Some(1),
            amount_due: MoneyFixtures::idr_tuition(),
            due_date: DateFixtures::january_due(),
        }
    }

    pub fn with_student(mut self, student_id: StudentId) -> Self {
        self.student_id = student_id;
        self
    }

    pub fn with_category(mut self, category_id: FeeCategoryId) -> Self {
        self.category_id = category_id;
        self
    }

    /// Bills a single month
    pub fn for_month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    /// Bills the whole academic year
    pub fn yearly(mut self) -> Self {
        self.month = None;
        self
    }

    pub fn with_amount_due(mut self, amount_due: Money) -> Self {
        self.amount_due = amount_due;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self
    }

    /// Billing period for the configured month
    pub fn period(&self) -> BillingPeriod {
        match self.month {
            Some(month) => BillingPeriod::monthly(self.academic_year_id, month)
                .expect("builder month must be 1..=12"),
            None => BillingPeriod::yearly(self.academic_year_id),
        }
    }

    /// Builds the bill
    ///
    /// # Panics
    ///
    /// Panics if the configured amount is not positive
    pub fn build(self) -> Bill {
        let period = self.period();
        Bill::new(self.student_id, self.category_id, period, self.amount_due, self.due_date)
            .expect("builder produced an invalid bill")
    }
}

/// Builder for legacy payments
pub struct PaymentBuilder {
    receipt_number: String,
    bill_id: BillId,
    student_id: StudentId,
    amount: Money,
    method: PaymentMethod,
    paid_on: NaiveDate,
    recorded_by: UserId,
    verified_by: Option<UserId>,
}

impl PaymentBuilder {
    /// Pending cash payment covering the whole of `bill`
    pub fn for_bill(bill: &Bill) -> Self {
        Self {
            receipt_number: StringFixtures::first_receipt_number().to_string(),
            bill_id: bill.id,
            student_id: bill.student_id,
            amount: bill.amount_due,
            method: PaymentMethod::Cash,
            paid_on: DateFixtures::january_paid(),
            recorded_by: IdFixtures::cashier(),
            verified_by: None,
        }
    }

    pub fn with_receipt_number(mut self, receipt_number: impl Into<String>) -> Self {
        self.receipt_number = receipt_number.into();
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn paid_on(mut self, paid_on: NaiveDate) -> Self {
        self.paid_on = paid_on;
        self
    }

    /// Marks the payment verified by the fixture supervisor
    pub fn verified(mut self) -> Self {
        self.verified_by = Some(IdFixtures::supervisor());
        self
    }

    /// Builds the payment
    ///
    /// # Panics
    ///
    /// Panics if the configured amount is not positive
    pub fn build(self) -> Payment {
        let mut payment = Payment::new(
            self.receipt_number,
            self.bill_id,
            self.student_id,
            self.amount,
            self.method,
            self.paid_on,
            self.recorded_by,
        )
        .expect("builder produced an invalid payment");

        if let Some(verifier) = self.verified_by {
            payment.verify(verifier).expect("pending payment must verify");
        }
        payment
    }
}

/// Builder for payment transactions (without items)
pub struct TransactionBuilder {
    transaction_number: String,
    payer_id: GuardianId,
    currency: Currency,
    method: PaymentMethod,
    paid_on: NaiveDate,
    proof_reference: Option<String>,
    recorded_by: UserId,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            transaction_number: StringFixtures::first_transaction_number().to_string(),
            payer_id: IdFixtures::guardian_id(),
            currency: Currency::IDR,
            method: PaymentMethod::BankTransfer,
            paid_on: DateFixtures::january_paid(),
            proof_reference: None,
            recorded_by: IdFixtures::cashier(),
        }
    }

    pub fn with_transaction_number(mut self, number: impl Into<String>) -> Self {
        self.transaction_number = number.into();
        self
    }

    pub fn with_payer(mut self, payer_id: GuardianId) -> Self {
        self.payer_id = payer_id;
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_proof(mut self, reference: impl Into<String>) -> Self {
        self.proof_reference = Some(reference.into());
        self
    }

    pub fn build(self) -> PaymentTransaction {
        PaymentTransaction::new(
            self.transaction_number,
            self.payer_id,
            self.currency,
            self.method,
            self.paid_on,
            self.proof_reference,
            self.recorded_by,
        )
    }
}

/// Builder for one bank statement line
pub struct StatementLineBuilder {
    transaction_date: NaiveDate,
    description: String,
    amount: Money,
    direction: Direction,
    reference: Option<String>,
}

impl StatementLineBuilder {
    /// Credit line for `amount` with an anonymous description
    pub fn credit(amount: Money) -> Self {
        Self {
            transaction_date: DateFixtures::january_paid(),
            description: StringFixtures::anonymous_transfer(),
            amount,
            direction: Direction::Credit,
            reference: None,
        }
    }

    /// Bank charge debit line
    pub fn bank_fee() -> Self {
        Self {
            transaction_date: DateFixtures::statement_end(),
            description: StringFixtures::bank_fee_description().to_string(),
            amount: MoneyFixtures::idr_bank_fee(),
            direction: Direction::Debit,
            reference: None,
        }
    }

    /// Credit line that quotes `payment`'s receipt number on its payment date
    pub fn paying(payment: &Payment) -> Self {
        Self::credit(payment.amount)
            .on(payment.paid_on)
            .with_description(StringFixtures::transfer_description(&payment.receipt_number))
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.transaction_date = date;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn build(self) -> StatementLineInput {
        StatementLineInput {
            transaction_date: self.transaction_date,
            description: self.description,
            amount: self.amount,
            direction: self.direction,
            reference: self.reference,
        }
    }
}

/// Builder for a whole imported statement
pub struct StatementBuilder {
    metadata: StatementMetadata,
    lines: Vec<StatementLineInput>,
}

impl Default for StatementBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementBuilder {
    /// Empty January statement
    pub fn new() -> Self {
        Self {
            metadata: StatementMetadata {
                file_name: StringFixtures::statement_file_name().to_string(),
                file_reference: None,
                bank_account: Some("BCA 123-456-7890".to_string()),
                period_start: DateFixtures::statement_start(),
                period_end: DateFixtures::statement_end(),
            },
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: StatementLineBuilder) -> Self {
        self.lines.push(line.build());
        self
    }

    pub fn with_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.metadata.period_start = start;
        self.metadata.period_end = end;
        self
    }

    pub fn build(self) -> (StatementMetadata, Vec<StatementLineInput>) {
        (self.metadata, self.lines)
    }
}
